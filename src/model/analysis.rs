use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::venue::{PriceBand, VenueRecord};

/// Thematic-fit verdict for one venue.
///
/// A `None` score means the vibe matcher fell back (LLM unavailable or
/// unparseable); `confidence` is 0 in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VibeRecord {
    pub vibe_score: Option<f64>,
    pub primary_style: String,
    pub visual_descriptors: Vec<String>,
    pub confidence: f64,
}

impl VibeRecord {
    /// The record emitted when the LLM gave nothing usable for a venue.
    pub fn fallback() -> Self {
        Self {
            vibe_score: None,
            primary_style: String::new(),
            visual_descriptors: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// How trustworthy a cost profile's price band is.
///
/// `High` means both catalog signals agreed; `Low` means they conflicted and
/// were resolved to the median band; `None` means no signal at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CostConfidence {
    High,
    Medium,
    Low,
    None,
}

/// Price profile for one venue, derived purely from catalog signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostRecord {
    pub price_range: Option<PriceBand>,
    pub confidence: CostConfidence,
    pub value_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskKind {
    Weather,
    Event,
    Other,
}

/// One real-world risk the Critic flagged for a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RiskRecord {
    #[serde(rename = "type")]
    pub kind: RiskKind,
    pub severity: RiskSeverity,
    #[serde(default)]
    pub detail: String,
}

/// A shortlisted venue with its rank, score, and explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedVenue {
    #[serde(flatten)]
    pub venue: VenueRecord,
    /// 1-based position in the shortlist.
    pub rank: u8,
    pub composite_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<PriceBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_confidence: Option<CostConfidence>,
    pub why: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_out: Option<String>,
}
