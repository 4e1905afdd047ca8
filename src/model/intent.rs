use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured intent extracted from the raw prompt by the Commander.
/// Every field is optional — the LLM fills in what it can.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
}

impl ParsedIntent {
    pub fn is_empty(&self) -> bool {
        self.activity.is_none()
            && self.group_size.is_none()
            && self.budget.is_none()
            && self.location.is_none()
            && self.vibe.is_none()
    }
}

/// How much machinery the Commander decided the request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    /// Simple lookup — Scout only, or light analysis.
    Tier1,
    /// Multi-factor personal request — Scout plus selected analysts.
    Tier2,
    /// Strategic request — the full analyst roster.
    Tier3,
}

/// The analyzers the Commander can activate. `Scout` is always mandatory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AnalystKind {
    Scout,
    VibeMatcher,
    CostAnalyst,
    Critic,
}

impl AnalystKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalystKind::Scout => "scout",
            AnalystKind::VibeMatcher => "vibe_matcher",
            AnalystKind::CostAnalyst => "cost_analyst",
            AnalystKind::Critic => "critic",
        }
    }
}
