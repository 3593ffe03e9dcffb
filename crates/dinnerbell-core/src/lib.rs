use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod cache_key;
pub mod config_file;
pub mod filters;
pub mod places;
pub mod rotation;
pub mod session;
pub mod store;

// Re-export for convenience
pub use cache::{CacheLookup, ResultCache};
pub use cache_key::{CACHE_TTL_MS, CacheKeys, derive_keys, is_fresh};
pub use filters::{ANY_CUISINE, CUISINES, FilterSet, canonical_cuisine};
pub use places::{PlacesBackend, PlacesError, SearchRequest};
pub use rotation::{PAGE_SIZE, RotationState};
pub use session::{RecommendationSession, ResultSource, SearchOutcome};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};

/// Price bucket shown next to a restaurant.
///
/// Serialized as the display string so cached payloads stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PriceLevel {
    #[serde(rename = "$")]
    Inexpensive,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    VeryExpensive,
    #[default]
    #[serde(rename = "Price varies")]
    Varies,
}

impl PriceLevel {
    /// Map a provider price level (`PRICE_LEVEL_*`) onto the four-level table.
    /// Anything unrecognized, including a missing level, is [`PriceLevel::Varies`].
    pub fn from_provider(level: Option<&str>) -> Self {
        match level {
            Some("PRICE_LEVEL_INEXPENSIVE") => PriceLevel::Inexpensive,
            Some("PRICE_LEVEL_MODERATE") => PriceLevel::Moderate,
            Some("PRICE_LEVEL_EXPENSIVE") => PriceLevel::Expensive,
            Some("PRICE_LEVEL_VERY_EXPENSIVE") => PriceLevel::VeryExpensive,
            _ => PriceLevel::Varies,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceLevel::Inexpensive => "$",
            PriceLevel::Moderate => "$$",
            PriceLevel::Expensive => "$$$",
            PriceLevel::VeryExpensive => "$$$$",
            PriceLevel::Varies => "Price varies",
        }
    }
}

impl std::fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recommendation, as cached and as rotated through pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRecord {
    /// Provider-assigned place id. Unique within a result set.
    pub id: String,
    pub name: String,
    pub food_type: String,
    pub price: PriceLevel,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("a search is already in progress")]
    SearchInFlight,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("places search error: {0}")]
    Places(#[from] PlacesError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("config error: {0}")]
    Config(String),
}

/// Default Google Places endpoint.
pub const DEFAULT_PLACES_BASE_URL: &str = "https://places.googleapis.com";

/// Runtime configuration for a recommendation session.
#[derive(Clone)]
pub struct Config {
    pub google_places_key: Option<String>,
    pub places_base_url: String,
    pub http_timeout_secs: u64,
    /// Path to the persistent SQLite store (optional).
    /// When unset, cached results only live as long as the process.
    pub cache_path: Option<PathBuf>,
    /// Skip cache reads and writes entirely; every search hits the provider.
    pub cache_disabled: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "google_places_key",
                &self.google_places_key.as_ref().map(|_| "***"),
            )
            .field("places_base_url", &self.places_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("cache_path", &self.cache_path)
            .field("cache_disabled", &self.cache_disabled)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_places_key: None,
            places_base_url: DEFAULT_PLACES_BASE_URL.to_string(),
            http_timeout_secs: 10,
            cache_path: None,
            cache_disabled: false,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Build a [`KeyValueStore`] from configuration.
///
/// If `cache_path` is set, opens a persistent SQLite-backed store.
/// Otherwise, returns an in-memory store.
pub fn build_store(cache_path: Option<&std::path::Path>) -> Arc<dyn KeyValueStore> {
    if let Some(path) = cache_path {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match SqliteStore::open(path) {
            Ok(store) => {
                tracing::info!(path = %path.display(), "opened persistent store");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to open store, falling back to in-memory");
            }
        }
    }
    Arc::new(MemoryStore::new())
}
