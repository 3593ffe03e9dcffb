use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Sentinel cuisine meaning "no cuisine filter".
pub const ANY_CUISINE: &str = "Any";

/// Cuisines offered by the search form, matching the provider's place types.
pub const CUISINES: &[&str] = &[
    "American",
    "Bakery",
    "Bar",
    "Barbecue",
    "Brazilian",
    "Breakfast",
    "Brunch",
    "Cafe",
    "Chinese",
    "Coffee Shop",
    "Fast Food",
    "French",
    "Greek",
    "Hamburger",
    "Ice Cream Shop",
    "Indian",
    "Indonesian",
    "Italian",
    "Japanese",
    "Korean",
    "Lebanese",
    "Mediterranean",
    "Mexican",
    "Middle Eastern",
    "Pizza",
    "Ramen",
    "Sandwich Shop",
    "Seafood",
    "Spanish",
    "Steakhouse",
    "Sushi",
    "Thai",
    "Turkish",
    "Vegan",
    "Vegetarian",
    "Vietnamese",
];

pub const MIN_DISTANCE_MILES: u32 = 1;
pub const MAX_DISTANCE_MILES: u32 = 50;
pub const MIN_PARTY_SIZE: u32 = 1;
pub const MAX_PARTY_SIZE: u32 = 20;

/// The criteria a user submits for one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    /// A cuisine from [`CUISINES`] or [`ANY_CUISINE`].
    pub food_type: String,
    pub party_size: u32,
    pub zip_code: String,
    /// Search radius in miles.
    pub distance: u32,
    pub is_open_now: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            food_type: ANY_CUISINE.to_string(),
            party_size: 2,
            zip_code: "80602".to_string(),
            distance: 15,
            is_open_now: true,
        }
    }
}

impl FilterSet {
    pub fn is_any_cuisine(&self) -> bool {
        self.food_type == ANY_CUISINE
    }

    /// Check ranges and canonicalize the cuisine spelling.
    ///
    /// Key derivation assumes a validated filter set; run this before searching.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        if !self.zip_code.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidFilter(format!(
                "zip code {:?} has no letters or digits",
                self.zip_code
            )));
        }
        if !(MIN_DISTANCE_MILES..=MAX_DISTANCE_MILES).contains(&self.distance) {
            return Err(CoreError::InvalidFilter(format!(
                "distance must be between {} and {} miles, got {}",
                MIN_DISTANCE_MILES, MAX_DISTANCE_MILES, self.distance
            )));
        }
        if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&self.party_size) {
            return Err(CoreError::InvalidFilter(format!(
                "party size must be between {} and {}, got {}",
                MIN_PARTY_SIZE, MAX_PARTY_SIZE, self.party_size
            )));
        }
        self.food_type = canonical_cuisine(&self.food_type)
            .ok_or_else(|| {
                CoreError::InvalidFilter(format!("unknown cuisine {:?}", self.food_type))
            })?
            .to_string();
        Ok(self)
    }
}

/// Resolve a user-typed cuisine to its listed spelling (case-insensitive).
pub fn canonical_cuisine(input: &str) -> Option<&'static str> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case(ANY_CUISINE) {
        return Some(ANY_CUISINE);
    }
    CUISINES
        .iter()
        .copied()
        .find(|c| c.eq_ignore_ascii_case(trimmed))
}
