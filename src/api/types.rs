use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::graph::NodeName;
use crate::model::{LatLng, ParsedIntent, RankedVenue};

/// Body of `POST /plan`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PlanRequest {
    pub prompt: String,
    #[serde(default)]
    pub group_size: Option<u32>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub vibe: Option<String>,
    #[serde(default)]
    pub member_locations: Option<Vec<LatLng>>,
    /// Opaque conversation context; passed through, never interpreted.
    #[serde(default)]
    pub chat_history: Option<serde_json::Value>,
}

impl PlanRequest {
    /// Explicit request fields become a partial seeded intent; the Commander
    /// merges its parse on top.
    pub fn seeded_intent(&self) -> ParsedIntent {
        ParsedIntent {
            activity: None,
            group_size: self.group_size.filter(|n| *n > 1),
            budget: self.budget.clone(),
            location: self.location.clone(),
            vibe: self.vibe.clone(),
        }
    }
}

/// Response of `POST /plan` and the WS terminal `result` payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanResponse {
    pub venues: Vec<RankedVenue>,
    pub execution_summary: String,
}

/// First (and only) client message on `GET /ws/plan`.
#[derive(Debug, Deserialize)]
pub struct WsPlanRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub member_locations: Vec<LatLng>,
}

/// Server frames on `GET /ws/plan`. Exactly one terminal frame
/// (`result` or `error`) is sent per connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Progress { node: String, label: String },
    Result { data: PlanResponse },
    Error { message: String },
}

/// Body of `POST /voice/synthesize`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VoiceSynthRequest {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Fixed node → user-readable progress label map. Presentation only; the
/// executor never sees these.
pub fn node_label(node: NodeName) -> &'static str {
    match node {
        NodeName::Commander => "Parsing your request...",
        NodeName::Scout => "Discovering venues...",
        NodeName::ParallelAnalysts => "Analysing vibes, cost & risks...",
        NodeName::Synthesizer => "Ranking results...",
    }
}

pub const DEFAULT_EXECUTION_SUMMARY: &str = "Pipeline complete.";
