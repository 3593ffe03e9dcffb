//! Cache identity for a search.
//!
//! A [`FilterSet`] maps to a pair of keys: one for the cached restaurant list and
//! one for the time it was stored. The key strings are kept byte-compatible with
//! stores written by earlier releases, so the composition below must not change
//! without bumping the namespace version.

use crate::filters::FilterSet;

/// Namespace for cached result payloads.
pub const DATA_NAMESPACE: &str = "restaurant_cache_v6";

/// Namespace for the stored-at timestamp of a payload.
pub const TIME_NAMESPACE: &str = "restaurant_cache_time_v6";

/// Cached results are usable for 24 hours after they were stored.
pub const CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// The `(data_key, time_key)` pair derived from a filter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeys {
    pub data_key: String,
    pub time_key: String,
}

/// Derive the cache key pair for `filters`.
///
/// Party size is not part of the key: it does not change which restaurants
/// exist, so searches that differ only in party size share cached results.
pub fn derive_keys(filters: &FilterSet) -> CacheKeys {
    let suffix = format!(
        "{}_{}_{}_{}",
        normalize_food_type(&filters.food_type),
        filters.distance,
        normalize_zip(&filters.zip_code),
        filters.is_open_now
    );
    CacheKeys {
        data_key: format!("{DATA_NAMESPACE}_{suffix}"),
        time_key: format!("{TIME_NAMESPACE}_{suffix}"),
    }
}

/// Whether a payload stored at `stored_at_ms` is still usable at `now_ms`.
///
/// Wall-clock time is trusted as-is; a clock that jumps backwards makes entries
/// look younger than they are.
pub fn is_fresh(stored_at_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(stored_at_ms) < CACHE_TTL_MS
}

/// Keep only ASCII letters and digits, lower-cased.
pub fn normalize_zip(zip: &str) -> String {
    zip.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Remove every whitespace character. Case is preserved.
pub fn normalize_food_type(food_type: &str) -> String {
    food_type.chars().filter(|c| !c.is_whitespace()).collect()
}
