use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::analysis::{CostRecord, RankedVenue, RiskRecord, VibeRecord};
use super::intent::{AnalystKind, ComplexityTier, ParsedIntent};
use super::venue::VenueRecord;

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// The shared state record driven through the pipeline graph.
///
/// One `PlanState` is created per request and discarded with the response;
/// it is never shared across requests. Nodes receive a read-only snapshot
/// and return a [`StateUpdate`]; the executor applies updates between nodes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanState {
    /// Original user text. Set at entry, never mutated.
    pub raw_prompt: String,
    pub parsed_intent: ParsedIntent,
    pub complexity_tier: ComplexityTier,
    /// Ordered set of analyzers to run. Always contains `scout` after the
    /// Commander has run.
    pub active_agents: Vec<AnalystKind>,
    /// Analyzer weights in [0, 1], keys a subset of `active_agents`.
    pub agent_weights: BTreeMap<AnalystKind, f64>,
    /// Advisory context strings from the memory store (at most 2).
    pub memory_context: Vec<String>,
    /// Deduplicated candidates, at most 10, discovery order preserved.
    pub candidate_venues: Vec<VenueRecord>,
    pub vibe_scores: BTreeMap<String, VibeRecord>,
    pub cost_profiles: BTreeMap<String, CostRecord>,
    pub risk_flags: BTreeMap<String, Vec<RiskRecord>>,
    /// Critic veto on the leading candidate. `fast_fail` and `veto` are a
    /// historically aliased pair — the Critic writes both, the Commander
    /// clears both, and the retry edge reads their disjunction.
    pub fast_fail: bool,
    pub fast_fail_reason: Option<String>,
    pub veto: bool,
    pub veto_reason: Option<String>,
    /// Number of replanning passes taken. Never exceeds 1.
    pub retry_count: u32,
    pub ranked_results: Vec<RankedVenue>,
    /// Global consensus line from the Synthesizer.
    pub execution_summary: Option<String>,
    /// Verified identity claims, when a Bearer token was presented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<serde_json::Value>,
    #[serde(default)]
    pub member_locations: Vec<LatLng>,
    /// Opaque conversation context passed through from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<serde_json::Value>,
}

impl PlanState {
    pub fn new(raw_prompt: impl Into<String>) -> Self {
        Self {
            raw_prompt: raw_prompt.into(),
            parsed_intent: ParsedIntent::default(),
            complexity_tier: ComplexityTier::Tier2,
            active_agents: Vec::new(),
            agent_weights: BTreeMap::new(),
            memory_context: Vec::new(),
            candidate_venues: Vec::new(),
            vibe_scores: BTreeMap::new(),
            cost_profiles: BTreeMap::new(),
            risk_flags: BTreeMap::new(),
            fast_fail: false,
            fast_fail_reason: None,
            veto: false,
            veto_reason: None,
            retry_count: 0,
            ranked_results: Vec::new(),
            execution_summary: None,
            user_profile: None,
            member_locations: Vec::new(),
            chat_history: None,
        }
    }

    /// Merge a partial update into the canonical state. Fields the update
    /// carries overwrite; absent fields are untouched.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(v) = update.parsed_intent {
            self.parsed_intent = v;
        }
        if let Some(v) = update.complexity_tier {
            self.complexity_tier = v;
        }
        if let Some(v) = update.active_agents {
            self.active_agents = v;
        }
        if let Some(v) = update.agent_weights {
            self.agent_weights = v;
        }
        if let Some(v) = update.memory_context {
            self.memory_context = v;
        }
        if let Some(v) = update.candidate_venues {
            self.candidate_venues = v;
        }
        if let Some(v) = update.vibe_scores {
            self.vibe_scores = v;
        }
        if let Some(v) = update.cost_profiles {
            self.cost_profiles = v;
        }
        if let Some(v) = update.risk_flags {
            self.risk_flags = v;
        }
        if let Some(v) = update.fast_fail {
            self.fast_fail = v;
        }
        if let Some(v) = update.fast_fail_reason {
            self.fast_fail_reason = v;
        }
        if let Some(v) = update.veto {
            self.veto = v;
        }
        if let Some(v) = update.veto_reason {
            self.veto_reason = v;
        }
        if let Some(v) = update.retry_count {
            self.retry_count = v;
        }
        if let Some(v) = update.ranked_results {
            self.ranked_results = v;
        }
        if let Some(v) = update.execution_summary {
            self.execution_summary = v;
        }
    }
}

/// A typed partial update returned by a node.
///
/// `None` means "leave the field alone". The reason/summary fields are
/// doubly optional so a node can explicitly clear them
/// (`Some(None)`) as opposed to not touching them (`None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub parsed_intent: Option<ParsedIntent>,
    pub complexity_tier: Option<ComplexityTier>,
    pub active_agents: Option<Vec<AnalystKind>>,
    pub agent_weights: Option<BTreeMap<AnalystKind, f64>>,
    pub memory_context: Option<Vec<String>>,
    pub candidate_venues: Option<Vec<VenueRecord>>,
    pub vibe_scores: Option<BTreeMap<String, VibeRecord>>,
    pub cost_profiles: Option<BTreeMap<String, CostRecord>>,
    pub risk_flags: Option<BTreeMap<String, Vec<RiskRecord>>>,
    pub fast_fail: Option<bool>,
    pub fast_fail_reason: Option<Option<String>>,
    pub veto: Option<bool>,
    pub veto_reason: Option<Option<String>>,
    pub retry_count: Option<u32>,
    pub ranked_results: Option<Vec<RankedVenue>>,
    pub execution_summary: Option<Option<String>>,
}

impl StateUpdate {
    /// Union two partials, the fan-in step of the parallel analyst stage.
    /// Where both carry a field, `other` wins; the analyzers write disjoint
    /// fields by construction so the ordering never matters in practice.
    pub fn union(mut self, other: StateUpdate) -> StateUpdate {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field;
                }
            };
        }
        take!(parsed_intent);
        take!(complexity_tier);
        take!(active_agents);
        take!(agent_weights);
        take!(memory_context);
        take!(candidate_venues);
        take!(vibe_scores);
        take!(cost_profiles);
        take!(risk_flags);
        take!(fast_fail);
        take!(fast_fail_reason);
        take!(veto);
        take!(veto_reason);
        take!(retry_count);
        take!(ranked_results);
        take!(execution_summary);
        self
    }
}
