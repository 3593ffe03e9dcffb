//! Store-backed cache of search results, keyed by [`derive_keys`].
//!
//! Each entry is written as one JSON record under the data key:
//!
//! ```json
//! { "storedAtEpochMs": 1700000000000, "restaurants": [ ... ] }
//! ```
//!
//! Older stores kept a bare JSON array under the data key and the decimal
//! timestamp under the time key. That layout is still read; the next insert for
//! the same filters rewrites it as a single record and drops the time key.
//!
//! Stale entries are never returned but are only deleted by
//! [`prune_expired`](ResultCache::prune_expired) or [`clear`](ResultCache::clear).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::RestaurantRecord;
use crate::cache_key::{CacheKeys, DATA_NAMESPACE, TIME_NAMESPACE, derive_keys, is_fresh};
use crate::filters::FilterSet;
use crate::store::{KeyValueStore, StoreError};

/// Outcome of a cache lookup. Only [`CacheLookup::Fresh`] carries usable data;
/// every other variant means "fetch again".
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Vec<RestaurantRecord>),
    /// An entry exists but is older than the TTL.
    Stale { age_ms: i64 },
    Miss,
    /// An entry exists but could not be decoded.
    Corrupt(String),
}

impl CacheLookup {
    pub fn is_fresh(&self) -> bool {
        matches!(self, CacheLookup::Fresh(_))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredResults {
    stored_at_epoch_ms: i64,
    restaurants: Vec<RestaurantRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Record(StoredResults),
    /// Bare array; timestamp lives under the time key.
    Legacy(Vec<RestaurantRecord>),
}

/// A decoded entry, before the freshness check.
enum Decoded {
    Entry {
        stored_at_ms: i64,
        restaurants: Vec<RestaurantRecord>,
    },
    /// Legacy payload whose time key is absent.
    Untimed,
    Corrupt(String),
}

pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Look up cached results for `filters` as of `now_ms`.
    ///
    /// Store read failures are reported as [`CacheLookup::Miss`].
    pub fn lookup(&self, filters: &FilterSet, now_ms: i64) -> CacheLookup {
        let keys = derive_keys(filters);
        let result = self.lookup_keys(&keys, now_ms);
        match &result {
            CacheLookup::Fresh(records) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %keys.data_key, count = records.len(), "cache hit");
            }
            CacheLookup::Stale { age_ms } => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %keys.data_key, age_ms, "cache entry stale");
            }
            CacheLookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %keys.data_key, "cache miss");
            }
            CacheLookup::Corrupt(reason) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %keys.data_key, reason = %reason, "ignoring corrupt cache entry");
            }
        }
        result
    }

    fn lookup_keys(&self, keys: &CacheKeys, now_ms: i64) -> CacheLookup {
        let raw = match self.store.get(&keys.data_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(key = %keys.data_key, error = %e, "cache read failed");
                return CacheLookup::Miss;
            }
        };

        let decoded = match self.decode(&raw, &keys.time_key) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(key = %keys.time_key, error = %e, "cache read failed");
                return CacheLookup::Miss;
            }
        };
        match decoded {
            Decoded::Entry {
                stored_at_ms,
                restaurants,
            } => {
                if is_fresh(stored_at_ms, now_ms) {
                    CacheLookup::Fresh(restaurants)
                } else {
                    CacheLookup::Stale {
                        age_ms: now_ms.saturating_sub(stored_at_ms),
                    }
                }
            }
            Decoded::Untimed => CacheLookup::Miss,
            Decoded::Corrupt(reason) => CacheLookup::Corrupt(reason),
        }
    }

    /// A failed read of the legacy timestamp is an error, not [`Decoded::Corrupt`].
    fn decode(&self, raw: &str, time_key: &str) -> Result<Decoded, StoreError> {
        let decoded = match serde_json::from_str::<StoredPayload>(raw) {
            Ok(StoredPayload::Record(record)) => Decoded::Entry {
                stored_at_ms: record.stored_at_epoch_ms,
                restaurants: record.restaurants,
            },
            Ok(StoredPayload::Legacy(restaurants)) => match self.store.get(time_key)? {
                Some(time) => match time.trim().parse::<i64>() {
                    Ok(stored_at_ms) => Decoded::Entry {
                        stored_at_ms,
                        restaurants,
                    },
                    Err(e) => Decoded::Corrupt(format!("bad timestamp {:?}: {}", time, e)),
                },
                None => Decoded::Untimed,
            },
            Err(e) => Decoded::Corrupt(e.to_string()),
        };
        Ok(decoded)
    }

    /// Store `restaurants` for `filters`, stamped with `now_ms`.
    ///
    /// Overwrites whatever was under the data key and removes any legacy
    /// timestamp so the entry is a single record.
    pub fn insert(
        &self,
        filters: &FilterSet,
        restaurants: &[RestaurantRecord],
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let keys = derive_keys(filters);
        let record = StoredResults {
            stored_at_epoch_ms: now_ms,
            restaurants: restaurants.to_vec(),
        };
        let json = serde_json::to_string(&record)?;
        self.store.set(&keys.data_key, &json)?;
        self.store.remove(&keys.time_key)?;
        tracing::debug!(key = %keys.data_key, count = restaurants.len(), "cache insert");
        Ok(())
    }

    /// Delete every entry that is stale or undecodable as of `now_ms`, plus
    /// timestamps left without a payload. Returns the number of entries removed.
    pub fn prune_expired(&self, now_ms: i64) -> Result<usize, StoreError> {
        let data_prefix = format!("{DATA_NAMESPACE}_");
        let time_prefix = format!("{TIME_NAMESPACE}_");
        let mut removed = 0;

        for data_key in self.store.keys_with_prefix(&data_prefix)? {
            let suffix = &data_key[data_prefix.len()..];
            let time_key = format!("{time_prefix}{suffix}");
            let Some(raw) = self.store.get(&data_key)? else {
                continue;
            };
            let keep = match self.decode(&raw, &time_key)? {
                Decoded::Entry { stored_at_ms, .. } => is_fresh(stored_at_ms, now_ms),
                Decoded::Untimed | Decoded::Corrupt(_) => false,
            };
            if !keep {
                self.store.remove(&data_key)?;
                self.store.remove(&time_key)?;
                removed += 1;
            }
        }

        for time_key in self.store.keys_with_prefix(&time_prefix)? {
            let suffix = &time_key[time_prefix.len()..];
            if self.store.get(&format!("{data_prefix}{suffix}"))?.is_none() {
                self.store.remove(&time_key)?;
            }
        }

        tracing::info!(removed, "pruned expired cache entries");
        Ok(removed)
    }

    /// Remove every cached search. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in self.store.keys_with_prefix(&format!("{DATA_NAMESPACE}_"))? {
            if self.store.remove(&key)? {
                removed += 1;
            }
        }
        for key in self.store.keys_with_prefix(&format!("{TIME_NAMESPACE}_"))? {
            self.store.remove(&key)?;
        }
        Ok(removed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("persistent", &self.store.is_persistent())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
