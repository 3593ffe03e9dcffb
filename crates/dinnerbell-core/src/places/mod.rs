//! Places search backends: the external provider that turns a filter set into
//! restaurant records.

pub mod google;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::RestaurantRecord;
use crate::filters::FilterSet;

pub use google::GooglePlaces;
pub use mock::{MockPlaces, MockResponse};

/// Only places rated at least this high are requested.
pub const MIN_RATING: f64 = 4.0;

/// Error type for places searches, distinguishing rate limiting from other errors.
#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {:.1}s", d.as_secs_f64()))
        .unwrap_or_default()
}

/// The request body sent to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub text_query: String,
    pub min_rating: f64,
    pub open_now: bool,
}

impl SearchRequest {
    /// Build the free-text query for `filters`.
    ///
    /// The zip code is passed as typed; only cache keys use the normalized form.
    pub fn from_filters(filters: &FilterSet) -> Self {
        let text_query = if filters.is_any_cuisine() {
            format!(
                "restaurants within {} miles of {}",
                filters.distance, filters.zip_code
            )
        } else {
            format!(
                "{} restaurants within {} miles of {}",
                filters.food_type, filters.distance, filters.zip_code
            )
        };
        Self {
            text_query,
            min_rating: MIN_RATING,
            open_now: filters.is_open_now,
        }
    }
}

/// A provider that can search for restaurants.
pub trait PlacesBackend: Send + Sync {
    /// Display name for logs (e.g., "Google Places").
    fn name(&self) -> &str;

    /// Run one search. An empty vector is a valid "nothing matched" answer.
    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RestaurantRecord>, PlacesError>> + Send + 'a>>;
}
