//! Mock places backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{PlacesBackend, PlacesError, SearchRequest};
use crate::RestaurantRecord;

/// A configurable mock response for [`MockPlaces`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Simulate a successful search returning these records.
    Results(Vec<RestaurantRecord>),
    /// Simulate a 429 rate-limit response.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate a generic error.
    Error(String),
}

/// A hand-rolled mock implementing [`PlacesBackend`] for tests.
///
/// Supports:
/// - A fixed response (used for every call), **or**
/// - A sequence of responses (one per call, repeating the last if exhausted).
/// - Optional per-call latency.
/// - Call counting and the last request seen.
pub struct MockPlaces {
    /// Each call pops the next response (stored reversed).
    responses: Mutex<Vec<MockResponse>>,
    /// Fallback when the sequence is empty (or single-response mode).
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    last_request: Mutex<Option<SearchRequest>>,
}

impl MockPlaces {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    /// An empty sequence behaves like an always-empty result.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        responses.reverse();
        let fallback = responses
            .first()
            .cloned()
            .unwrap_or(MockResponse::Results(Vec::new()));
        Self {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }

    fn next_response(&self) -> MockResponse {
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl PlacesBackend for MockPlaces {
    fn name(&self) -> &str {
        "Mock"
    }

    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RestaurantRecord>, PlacesError>> + Send + 'a>>
    {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Results(records) => Ok(records),
                MockResponse::RateLimited { retry_after } => {
                    Err(PlacesError::RateLimited { retry_after })
                }
                MockResponse::Error(msg) => Err(PlacesError::Other(msg)),
            }
        })
    }
}
