//! One user's recommendation session: cache-or-fetch on search, rotation on
//! "show more".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::cache::{CacheLookup, ResultCache};
use crate::filters::FilterSet;
use crate::places::{GooglePlaces, PlacesBackend, SearchRequest};
use crate::rotation::RotationState;
use crate::store::KeyValueStore;
use crate::{Config, CoreError, build_store, now_epoch_ms};

/// Where the results of a search came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Provider,
    /// The provider call failed; the session shows no results.
    FetchFailed(String),
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub source: ResultSource,
    /// The freshly initialized rotation for this search.
    pub state: RotationState,
}

/// Clears the in-flight flag when a search finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RecommendationSession {
    backend: Arc<dyn PlacesBackend>,
    cache: Option<ResultCache>,
    client: reqwest::Client,
    timeout: Duration,
    in_flight: AtomicBool,
    rotation: Mutex<RotationState>,
}

impl RecommendationSession {
    /// `store` of `None` disables caching: every search goes to the provider.
    pub fn new(
        backend: Arc<dyn PlacesBackend>,
        store: Option<Arc<dyn KeyValueStore>>,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            cache: store.map(ResultCache::new),
            client,
            timeout,
            in_flight: AtomicBool::new(false),
            rotation: Mutex::new(RotationState::default()),
        }
    }

    /// Build a session against Google Places from configuration.
    pub fn from_config(config: &Config) -> Result<Self, CoreError> {
        let api_key = config.google_places_key.clone().ok_or_else(|| {
            CoreError::Config(
                "no Google Places API key (set GOOGLE_PLACES_API_KEY or pass --api-key)".into(),
            )
        })?;
        let backend = Arc::new(GooglePlaces::new(api_key, config.places_base_url.clone()));
        let store = if config.cache_disabled {
            None
        } else {
            Some(build_store(config.cache_path.as_deref()))
        };
        let client = reqwest::Client::builder()
            .user_agent(concat!("dinnerbell/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(
            backend,
            store,
            client,
            Duration::from_secs(config.http_timeout_secs),
        ))
    }

    /// Run a search for `filters` and make its results the current rotation.
    ///
    /// Rejected with [`CoreError::SearchInFlight`] while another search is
    /// outstanding. Provider failures are not errors here: they yield an empty
    /// rotation with [`ResultSource::FetchFailed`].
    pub async fn search(&self, filters: &FilterSet) -> Result<SearchOutcome, CoreError> {
        self.search_at(filters, now_epoch_ms()).await
    }

    /// [`search`](Self::search) with an explicit clock reading.
    pub async fn search_at(
        &self,
        filters: &FilterSet,
        now_ms: i64,
    ) -> Result<SearchOutcome, CoreError> {
        let filters = filters.clone().validate()?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("search rejected: another search is in flight");
            return Err(CoreError::SearchInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        if let Some(cache) = &self.cache
            && let CacheLookup::Fresh(records) = cache.lookup(&filters, now_ms)
        {
            tracing::info!(
                food_type = %filters.food_type,
                zip = %filters.zip_code,
                count = records.len(),
                "loaded cached results"
            );
            return Ok(self.replace_rotation(records, ResultSource::Cache));
        }

        let request = SearchRequest::from_filters(&filters);
        tracing::info!(backend = self.backend.name(), query = %request.text_query, "fetching fresh results");

        match self
            .backend
            .search(&request, &self.client, self.timeout)
            .await
        {
            Ok(records) => {
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.insert(&filters, &records, now_ms)
                {
                    tracing::warn!(error = %e, "failed to cache search results");
                }
                Ok(self.replace_rotation(records, ResultSource::Provider))
            }
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "places search failed");
                Ok(self.replace_rotation(Vec::new(), ResultSource::FetchFailed(e.to_string())))
            }
        }
    }

    fn replace_rotation(
        &self,
        records: Vec<crate::RestaurantRecord>,
        source: ResultSource,
    ) -> SearchOutcome {
        let state = RotationState::initialize(records);
        *self.lock_rotation() = state.clone();
        SearchOutcome { source, state }
    }

    /// Advance the current rotation by one page and return the new state.
    pub fn show_more(&self) -> RotationState {
        let mut rotation = self.lock_rotation();
        *rotation = rotation.advance();
        rotation.clone()
    }

    /// The rotation as it stands.
    pub fn current(&self) -> RotationState {
        self.lock_rotation().clone()
    }

    pub fn is_searching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    fn lock_rotation(&self) -> MutexGuard<'_, RotationState> {
        // RotationState is replaced wholesale, so a poisoned lock still holds a
        // consistent value.
        self.rotation.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::{MockPlaces, MockResponse};
    use crate::store::MemoryStore;
    use crate::{PriceLevel, RestaurantRecord};

    fn record(id: &str) -> RestaurantRecord {
        RestaurantRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            food_type: "pizza".into(),
            price: PriceLevel::Varies,
            rating: None,
            review_count: 0,
            website: None,
            google_maps_url: None,
        }
    }

    #[test]
    fn from_config_requires_api_key() {
        let err = RecommendationSession::from_config(&Config::default())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn from_config_without_cache() {
        let config = Config {
            google_places_key: Some("key".into()),
            cache_disabled: true,
            ..Config::default()
        };
        let session = RecommendationSession::from_config(&config).unwrap();
        assert!(session.cache().is_none());
        assert!(session.current().is_empty());
    }

    #[tokio::test]
    async fn invalid_filters_are_rejected_before_fetch() {
        let mock = Arc::new(MockPlaces::new(MockResponse::Results(vec![])));
        let session = RecommendationSession::new(
            mock.clone(),
            Some(Arc::new(MemoryStore::new())),
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        let filters = FilterSet {
            distance: 0,
            ..FilterSet::default()
        };
        let err = session.search(&filters).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidFilter(_)));
        assert_eq!(mock.call_count(), 0);
        assert!(!session.is_searching());
    }

    #[tokio::test]
    async fn show_more_replaces_current_rotation() {
        let mock = Arc::new(MockPlaces::new(MockResponse::Results(
            (0..5).map(|i| record(&format!("p{i}"))).collect(),
        )));
        let session = RecommendationSession::new(
            mock,
            None,
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        session.search(&FilterSet::default()).await.unwrap();
        let next = session.show_more();
        let ids: Vec<_> = next.visible().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p4", "p0"]);
        assert_eq!(session.current(), next);
    }
}
