//! Google Places (New) text search backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;

use super::{PlacesBackend, PlacesError, SearchRequest};
use crate::{PriceLevel, RestaurantRecord};

/// Only the fields mapped into [`RestaurantRecord`] are requested.
pub const FIELD_MASK: &str = "places.id,places.displayName,places.primaryType,places.priceLevel,places.rating,places.userRatingCount,places.websiteUri,places.googleMapsUri";

const UNKNOWN_NAME: &str = "Unknown Name";
const UNKNOWN_FOOD_TYPE: &str = "Any";

pub struct GooglePlaces {
    pub api_key: String,
    /// Endpoint root, e.g. `https://places.googleapis.com`. Overridable for tests.
    pub base_url: String,
}

impl GooglePlaces {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { api_key, base_url }
    }

    fn search_url(&self) -> String {
        format!("{}/v1/places:searchText", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlacesResponse {
    #[serde(default)]
    pub places: Vec<Place>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: Option<String>,
    pub display_name: Option<LocalizedText>,
    pub primary_type: Option<String>,
    pub price_level: Option<String>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<u64>,
    pub website_uri: Option<String>,
    pub google_maps_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalizedText {
    pub text: Option<String>,
}

/// Turn a provider place type like `fast_food_restaurant` into `fast food`.
pub fn food_type_from_primary(primary_type: Option<&str>) -> String {
    match primary_type {
        Some(t) if !t.is_empty() => t
            .strip_suffix("_restaurant")
            .unwrap_or(t)
            .replace('_', " "),
        _ => UNKNOWN_FOOD_TYPE.to_string(),
    }
}

/// Map one provider place into a record. Places without an id are dropped,
/// since pages are deduplicated by id.
pub fn map_place(place: Place) -> Option<RestaurantRecord> {
    let id = place.id.filter(|id| !id.is_empty())?;
    let name = place
        .display_name
        .and_then(|n| n.text)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    Some(RestaurantRecord {
        id,
        name,
        food_type: food_type_from_primary(place.primary_type.as_deref()),
        price: PriceLevel::from_provider(place.price_level.as_deref()),
        rating: place.rating,
        review_count: place.user_rating_count.unwrap_or(0),
        website: place.website_uri.filter(|u| !u.is_empty()),
        google_maps_url: place.google_maps_uri.filter(|u| !u.is_empty()),
    })
}

/// Map a whole response, keeping provider order.
pub fn map_response(response: PlacesResponse) -> Vec<RestaurantRecord> {
    response.places.into_iter().filter_map(map_place).collect()
}

fn parse_retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl PlacesBackend for GooglePlaces {
    fn name(&self) -> &str {
        "Google Places"
    }

    fn search<'a>(
        &'a self,
        request: &'a SearchRequest,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RestaurantRecord>, PlacesError>> + Send + 'a>>
    {
        Box::pin(async move {
            let resp = client
                .post(self.search_url())
                .header("X-Goog-Api-Key", &self.api_key)
                .header("X-Goog-FieldMask", FIELD_MASK)
                .json(request)
                .timeout(timeout)
                .send()
                .await?;

            let status = resp.status();
            if status.as_u16() == 429 {
                return Err(PlacesError::RateLimited {
                    retry_after: parse_retry_after(&resp),
                });
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(PlacesError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = resp.bytes().await?;
            // An empty body means no places, same as `{}`.
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Vec::new());
            }
            let data: PlacesResponse =
                serde_json::from_slice(&bytes).map_err(|e| PlacesError::Decode(e.to_string()))?;
            Ok(map_response(data))
        })
    }
}
