use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub cache: Option<CacheConfig>,
    pub search: Option<SearchDefaults>,
    pub http: Option<HttpConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub google_places_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub path: Option<String>,
    pub disabled: Option<bool>,
}

/// Values pre-filled into a search when the user does not give them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDefaults {
    pub zip_code: Option<String>,
    pub distance: Option<u32>,
    pub food_type: Option<String>,
    pub party_size: Option<u32>,
    pub open_now: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/dinnerbell/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dinnerbell").join("config.toml"))
}

/// Default location of the persistent store: `<cache_dir>/dinnerbell/cache.db`.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("dinnerbell").join("cache.db"))
}

/// Load config by cascading CWD `.dinnerbell.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".dinnerbell.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api: Some(ApiConfig {
            google_places_key: overlay
                .api
                .as_ref()
                .and_then(|a| a.google_places_key.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.google_places_key.clone())),
            base_url: overlay
                .api
                .as_ref()
                .and_then(|a| a.base_url.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.base_url.clone())),
        }),
        cache: Some(CacheConfig {
            path: overlay
                .cache
                .as_ref()
                .and_then(|c| c.path.clone())
                .or_else(|| base.cache.as_ref().and_then(|c| c.path.clone())),
            disabled: overlay
                .cache
                .as_ref()
                .and_then(|c| c.disabled)
                .or_else(|| base.cache.as_ref().and_then(|c| c.disabled)),
        }),
        search: Some(SearchDefaults {
            zip_code: overlay
                .search
                .as_ref()
                .and_then(|s| s.zip_code.clone())
                .or_else(|| base.search.as_ref().and_then(|s| s.zip_code.clone())),
            distance: overlay
                .search
                .as_ref()
                .and_then(|s| s.distance)
                .or_else(|| base.search.as_ref().and_then(|s| s.distance)),
            food_type: overlay
                .search
                .as_ref()
                .and_then(|s| s.food_type.clone())
                .or_else(|| base.search.as_ref().and_then(|s| s.food_type.clone())),
            party_size: overlay
                .search
                .as_ref()
                .and_then(|s| s.party_size)
                .or_else(|| base.search.as_ref().and_then(|s| s.party_size)),
            open_now: overlay
                .search
                .as_ref()
                .and_then(|s| s.open_now)
                .or_else(|| base.search.as_ref().and_then(|s| s.open_now)),
        }),
        http: Some(HttpConfig {
            timeout_secs: overlay
                .http
                .as_ref()
                .and_then(|h| h.timeout_secs)
                .or_else(|| base.http.as_ref().and_then(|h| h.timeout_secs)),
        }),
    }
}
