//! Integration tests for [`RecommendationSession`].
//!
//! These use the [`MockPlaces`] backend and an in-memory store, so no HTTP
//! requests are made.

use std::sync::Arc;
use std::time::Duration;

use dinnerbell_core::cache_key::CACHE_TTL_MS;
use dinnerbell_core::places::{MockPlaces, MockResponse};
use dinnerbell_core::{
    CoreError, FilterSet, KeyValueStore, MemoryStore, PriceLevel, RecommendationSession,
    RestaurantRecord, ResultSource, StoreError, derive_keys,
};

const NOW: i64 = 1_700_000_000_000;

fn record(id: &str) -> RestaurantRecord {
    RestaurantRecord {
        id: id.to_string(),
        name: format!("Restaurant {id}"),
        food_type: "mexican".into(),
        price: PriceLevel::Moderate,
        rating: Some(4.4),
        review_count: 57,
        website: None,
        google_maps_url: Some(format!("https://maps.google.com/?q={id}")),
    }
}

fn records(n: usize) -> Vec<RestaurantRecord> {
    (0..n).map(|i| record(&format!("m{i}"))).collect()
}

fn ids(page: &[RestaurantRecord]) -> Vec<&str> {
    page.iter().map(|r| r.id.as_str()).collect()
}

fn mexican() -> FilterSet {
    FilterSet {
        food_type: "Mexican".into(),
        party_size: 4,
        zip_code: "80602".into(),
        distance: 10,
        is_open_now: true,
    }
}

fn session(mock: Arc<MockPlaces>, store: Arc<MemoryStore>) -> RecommendationSession {
    RecommendationSession::new(
        mock,
        Some(store),
        reqwest::Client::new(),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn miss_fetches_and_caches() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(7))));
    let store = Arc::new(MemoryStore::new());
    let session = session(mock.clone(), store.clone());

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Provider);
    assert_eq!(ids(outcome.state.visible()), vec!["m0", "m1", "m2"]);
    assert_eq!(outcome.state.queue().len(), 4);
    assert_eq!(mock.call_count(), 1);

    let request = mock.last_request().unwrap();
    assert_eq!(
        request.text_query,
        "Mexican restaurants within 10 miles of 80602"
    );
    assert_eq!(request.min_rating, 4.0);
    assert!(request.open_now);

    let keys = derive_keys(&mexican());
    assert!(store.get(&keys.data_key).unwrap().is_some());
}

#[tokio::test]
async fn fresh_cache_skips_provider() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(5))));
    let store = Arc::new(MemoryStore::new());
    let session = session(mock.clone(), store);

    session.search_at(&mexican(), NOW).await.unwrap();
    let second = session
        .search_at(&mexican(), NOW + CACHE_TTL_MS - 1)
        .await
        .unwrap();

    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(ids(second.state.visible()), vec!["m0", "m1", "m2"]);
    assert_eq!(mock.call_count(), 1);
    assert_eq!(session.cache().unwrap().hits(), 1);
}

#[tokio::test]
async fn party_size_reuses_cached_results() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(4))));
    let session = session(mock.clone(), Arc::new(MemoryStore::new()));

    session.search_at(&mexican(), NOW).await.unwrap();
    let bigger = FilterSet {
        party_size: 12,
        ..mexican()
    };
    let outcome = session.search_at(&bigger, NOW + 1).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Cache);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn stale_cache_refetches_and_overwrites() {
    let mock = Arc::new(MockPlaces::with_sequence(vec![
        MockResponse::Results(records(3)),
        MockResponse::Results(vec![record("new")]),
    ]));
    let session = session(mock.clone(), Arc::new(MemoryStore::new()));

    session.search_at(&mexican(), NOW).await.unwrap();
    let later = NOW + CACHE_TTL_MS;
    let outcome = session.search_at(&mexican(), later).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Provider);
    assert_eq!(ids(outcome.state.visible()), vec!["new"]);
    assert_eq!(mock.call_count(), 2);

    let cached = session.search_at(&mexican(), later + 1).await.unwrap();
    assert_eq!(cached.source, ResultSource::Cache);
    assert_eq!(ids(cached.state.visible()), vec!["new"]);
}

#[tokio::test]
async fn corrupt_cache_entry_triggers_refetch() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(2))));
    let store = Arc::new(MemoryStore::new());
    let keys = derive_keys(&mexican());
    store.set(&keys.data_key, "[{\"id\": 5").unwrap();
    let session = session(mock.clone(), store);

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Provider);
    assert_eq!(mock.call_count(), 1);

    let again = session.search_at(&mexican(), NOW + 1).await.unwrap();
    assert_eq!(again.source, ResultSource::Cache);
}

#[tokio::test]
async fn fetch_failure_yields_empty_rotation_and_no_cache_write() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Error(
        "connection reset".into(),
    )));
    let store = Arc::new(MemoryStore::new());
    let session = session(mock.clone(), store.clone());

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert!(matches!(outcome.source, ResultSource::FetchFailed(ref m) if m.contains("connection reset")));
    assert!(outcome.state.is_empty());
    assert!(session.current().visible().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn rate_limit_is_a_fetch_failure() {
    let mock = Arc::new(MockPlaces::new(MockResponse::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    }));
    let session = session(mock, Arc::new(MemoryStore::new()));
    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert!(matches!(outcome.source, ResultSource::FetchFailed(_)));
}

#[tokio::test]
async fn empty_results_are_cached_as_no_match() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(Vec::new())));
    let session = session(mock.clone(), Arc::new(MemoryStore::new()));

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Provider);
    assert!(outcome.state.is_empty());
    assert!(session.show_more().visible().is_empty());

    let again = session.search_at(&mexican(), NOW + 1).await.unwrap();
    assert_eq!(again.source, ResultSource::Cache);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn new_search_replaces_rotation() {
    let mock = Arc::new(MockPlaces::with_sequence(vec![
        MockResponse::Results(records(10)),
        MockResponse::Results(vec![record("x"), record("y")]),
    ]));
    let session = session(mock, Arc::new(MemoryStore::new()));

    session.search_at(&mexican(), NOW).await.unwrap();
    session.show_more();
    assert_eq!(ids(session.current().visible()), vec!["m3", "m4", "m5"]);

    let thai = FilterSet {
        food_type: "Thai".into(),
        ..mexican()
    };
    session.search_at(&thai, NOW).await.unwrap();
    assert_eq!(ids(session.current().visible()), vec!["x", "y"]);
    assert!(!session.current().can_show_more());
}

#[tokio::test]
async fn show_more_walks_pages_then_recycles() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(4))));
    let session = session(mock, Arc::new(MemoryStore::new()));

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert_eq!(ids(outcome.state.visible()), vec!["m0", "m1", "m2"]);
    assert!(outcome.state.can_show_more());

    let next = session.show_more();
    assert_eq!(ids(next.visible()), vec!["m3", "m0", "m1"]);
    assert_eq!(ids(next.queue()), vec!["m2"]);
}

#[tokio::test]
async fn concurrent_search_is_rejected_while_in_flight() {
    let mock = Arc::new(
        MockPlaces::new(MockResponse::Results(records(3))).with_delay(Duration::from_millis(50)),
    );
    let session = session(mock.clone(), Arc::new(MemoryStore::new()));

    let filters = mexican();
    let (first, second) = tokio::join!(
        session.search_at(&filters, NOW),
        session.search_at(&filters, NOW)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(CoreError::SearchInFlight)));
    assert_eq!(mock.call_count(), 1);
    assert!(!session.is_searching());

    // Gate is released once the first search completes.
    let third = session.search_at(&mexican(), NOW + 1).await.unwrap();
    assert_eq!(third.source, ResultSource::Cache);
}

#[tokio::test]
async fn session_without_store_always_fetches() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(records(3))));
    let session = RecommendationSession::new(
        mock.clone(),
        None,
        reqwest::Client::new(),
        Duration::from_secs(5),
    );
    session.search_at(&mexican(), NOW).await.unwrap();
    session.search_at(&mexican(), NOW + 1).await.unwrap();
    assert_eq!(mock.call_count(), 2);
}

/// A store whose every operation fails.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Poisoned)
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    fn remove(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Poisoned)
    }
    fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn store_failures_still_show_fetched_results() {
    let mock = Arc::new(MockPlaces::new(MockResponse::Results(vec![
        record("a"),
        record("b"),
        record("c"),
        record("d"),
    ])));
    let session = RecommendationSession::new(
        mock.clone(),
        Some(Arc::new(BrokenStore)),
        reqwest::Client::new(),
        Duration::from_secs(5),
    );

    let outcome = session.search_at(&mexican(), NOW).await.unwrap();
    assert_eq!(outcome.source, ResultSource::Provider);
    assert_eq!(ids(outcome.state.visible()), vec!["a", "b", "c"]);
    assert_eq!(mock.call_count(), 1);

    let next = session.show_more();
    assert_eq!(ids(next.visible()), vec!["d", "a", "b"]);

    // Nothing was cached, so the next search fetches again.
    let again = session.search_at(&mexican(), NOW + 1).await.unwrap();
    assert_eq!(again.source, ResultSource::Provider);
    assert_eq!(mock.call_count(), 2);
}
