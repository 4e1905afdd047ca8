use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which catalog a venue record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VenueSource {
    GooglePlaces,
    Yelp,
}

/// A price band on the common four-dollar-sign scale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum PriceBand {
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Upscale,
    #[serde(rename = "$$$$")]
    Luxury,
}

impl PriceBand {
    /// Numeric tier 1..=4, cheapest first.
    pub fn tier(self) -> u8 {
        match self {
            PriceBand::Budget => 1,
            PriceBand::Moderate => 2,
            PriceBand::Upscale => 3,
            PriceBand::Luxury => 4,
        }
    }

    /// Inverse of [`tier`](Self::tier). Out-of-range input is clamped.
    pub fn from_tier(tier: u8) -> Self {
        match tier {
            0 | 1 => PriceBand::Budget,
            2 => PriceBand::Moderate,
            3 => PriceBand::Upscale,
            _ => PriceBand::Luxury,
        }
    }

    /// Monotone-decreasing value score used by the cost analyst.
    pub fn value_score(self) -> f64 {
        match self {
            PriceBand::Budget => 0.9,
            PriceBand::Moderate => 0.7,
            PriceBand::Upscale => 0.5,
            PriceBand::Luxury => 0.3,
        }
    }

    /// Parse a dollar-sign string like `"$$"`. Unknown strings map to `None`.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.trim() {
            "$" => Some(PriceBand::Budget),
            "$$" => Some(PriceBand::Moderate),
            "$$$" => Some(PriceBand::Upscale),
            "$$$$" => Some(PriceBand::Luxury),
            _ => None,
        }
    }
}

/// A candidate venue as returned by one of the catalogs.
///
/// `venue_id` is catalog-qualified (`gp_…` / `yelp_…`) and only meaningful
/// for the life of a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VenueRecord {
    pub venue_id: String,
    pub name: String,
    /// Decimal degrees.
    pub lat: f64,
    pub lng: f64,
    pub rating: f64,
    pub review_count: u32,
    /// Photo URLs, best first.
    pub photos: Vec<String>,
    pub category: String,
    pub website: String,
    pub source: VenueSource,
    /// The price band reported by this record's own catalog, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceBand>,
    /// Per-catalog price signals, populated when deduplication merges a
    /// Google and a Yelp record for the same venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_price: Option<PriceBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yelp_price: Option<PriceBand>,
}
