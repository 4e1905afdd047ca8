use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::graph::{Node, NodeName, PipelineError};
use crate::model::{
    AnalystKind, PlanState, RankedVenue, RiskSeverity, StateUpdate, VenueRecord,
};
use crate::services::Services;
use crate::services::llm::strip_code_fences;

/// Shortlist length.
const TOP_N: usize = 3;

/// Composite-score penalties per flagged risk.
const HIGH_RISK_PENALTY: f64 = 0.15;
const MEDIUM_RISK_PENALTY: f64 = 0.05;

/// Neutral defaults when an analyzer produced nothing for a venue.
const NEUTRAL_VIBE: f64 = 0.5;
const NEUTRAL_VALUE: f64 = 0.3;

/// The ranking node: blends the analysts' outputs into a composite score,
/// takes the top three, and asks the LLM to explain each pick plus a global
/// consensus line for the whole shortlist.
pub struct SynthesizerNode {
    services: Arc<Services>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExplanation {
    #[serde(default)]
    why: String,
    #[serde(default)]
    watch_out: Option<String>,
}

impl SynthesizerNode {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Node for SynthesizerNode {
    fn name(&self) -> NodeName {
        NodeName::Synthesizer
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        if snapshot.candidate_venues.is_empty() {
            return Ok(StateUpdate {
                ranked_results: Some(Vec::new()),
                ..Default::default()
            });
        }

        let mut scored: Vec<(&VenueRecord, f64)> = snapshot
            .candidate_venues
            .iter()
            .map(|v| (v, composite_score(snapshot, &v.venue_id)))
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
                .then_with(|| b.review_count.cmp(&a.review_count))
        });
        scored.truncate(TOP_N);

        // Explanations for every pick run concurrently, plus one consensus
        // call over the whole shortlist.
        let mut set = tokio::task::JoinSet::new();
        for (i, (venue, _)) in scored.iter().enumerate() {
            let services = Arc::clone(&self.services);
            let prompt = explanation_prompt(snapshot, venue);
            set.spawn(async move { (i, explain(&services, &prompt).await) });
        }

        let names: Vec<&str> = scored.iter().map(|(v, _)| v.name.as_str()).collect();
        let consensus_prompt = format!(
            "You are summarizing a venue shortlist for the request \"{}\". \
             The ranked picks are: {}. \
             Reply with one plain-text sentence of overall guidance, no JSON.",
            snapshot.raw_prompt,
            names.join(", "),
        );
        let consensus = match self.services.llm.generate(&consensus_prompt, &[]).await {
            Ok(Some(text)) => Some(text.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "consensus call failed");
                None
            }
        };

        let mut explanations: Vec<RawExplanation> =
            (0..scored.len()).map(|_| RawExplanation::default()).collect();
        while let Some(result) = set.join_next().await {
            if let Ok((i, explanation)) = result {
                explanations[i] = explanation;
            }
        }

        let ranked: Vec<RankedVenue> = scored
            .into_iter()
            .zip(explanations)
            .enumerate()
            .map(|(i, ((venue, composite), explanation))| {
                let cost = snapshot.cost_profiles.get(&venue.venue_id);
                RankedVenue {
                    venue: venue.clone(),
                    rank: (i + 1) as u8,
                    composite_score: composite,
                    vibe_score: snapshot
                        .vibe_scores
                        .get(&venue.venue_id)
                        .and_then(|v| v.vibe_score),
                    price_range: cost.and_then(|c| c.price_range),
                    price_confidence: cost.map(|c| c.confidence),
                    why: explanation.why,
                    watch_out: explanation.watch_out.filter(|w| !w.is_empty()),
                }
            })
            .collect();

        tracing::info!(results = ranked.len(), "synthesis complete");
        Ok(StateUpdate {
            ranked_results: Some(ranked),
            execution_summary: Some(consensus),
            ..Default::default()
        })
    }
}

/// Weighted blend of vibe and value minus the risk penalty.
///
/// Weights default to 1.0 when the plan didn't set them; missing per-venue
/// scores default neutrally so a silent analyzer never zeroes a candidate.
pub fn composite_score(state: &PlanState, venue_id: &str) -> f64 {
    let w_vibe = state
        .agent_weights
        .get(&AnalystKind::VibeMatcher)
        .copied()
        .unwrap_or(1.0);
    let w_cost = state
        .agent_weights
        .get(&AnalystKind::CostAnalyst)
        .copied()
        .unwrap_or(1.0);

    let s_vibe = state
        .vibe_scores
        .get(venue_id)
        .and_then(|v| v.vibe_score)
        .unwrap_or(NEUTRAL_VIBE);
    let s_cost = state
        .cost_profiles
        .get(venue_id)
        .map(|c| c.value_score)
        .unwrap_or(NEUTRAL_VALUE);

    let risk_penalty = state
        .risk_flags
        .get(venue_id)
        .map(|risks| {
            risks
                .iter()
                .map(|r| match r.severity {
                    RiskSeverity::High => HIGH_RISK_PENALTY,
                    RiskSeverity::Medium => MEDIUM_RISK_PENALTY,
                    RiskSeverity::Low => 0.0,
                })
                .sum::<f64>()
        })
        .unwrap_or(0.0);

    let denom = w_vibe + w_cost;
    let blended = if denom > 0.0 {
        (w_vibe * s_vibe + w_cost * s_cost) / denom
    } else {
        (s_vibe + s_cost) / 2.0
    };
    blended - risk_penalty
}

fn explanation_prompt(state: &PlanState, venue: &VenueRecord) -> String {
    let vibe = state.vibe_scores.get(&venue.venue_id);
    let cost = state.cost_profiles.get(&venue.venue_id);
    let risks = state.risk_flags.get(&venue.venue_id);
    format!(
        r#"You are explaining a venue recommendation to the user who asked: "{prompt}"

Venue: {name} ({category}), rating {rating} over {reviews} reviews.
Vibe analysis: {vibe}
Cost analysis: {cost}
Risk flags: {risks}

Output exact JSON, no markdown:
{{"why": "one short sentence on why this fits", "watch_out": "one short caveat, or null"}}"#,
        prompt = state.raw_prompt,
        name = venue.name,
        category = venue.category,
        rating = venue.rating,
        reviews = venue.review_count,
        vibe = json!(vibe),
        cost = json!(cost),
        risks = json!(risks),
    )
}

async fn explain(services: &Services, prompt: &str) -> RawExplanation {
    match services.llm.generate(prompt, &[]).await {
        Ok(Some(text)) => match serde_json::from_str(strip_code_fences(&text)) {
            Ok(explanation) => explanation,
            Err(e) => {
                tracing::warn!(error = %e, "explanation reply was not valid JSON");
                RawExplanation::default()
            }
        },
        Ok(None) => RawExplanation::default(),
        Err(e) => {
            tracing::warn!(error = %e, "explanation call failed");
            RawExplanation::default()
        }
    }
}
