use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::model::{ParsedIntent, PlanState, RiskRecord, StateUpdate, VenueRecord};
use crate::services::Services;
use crate::services::llm::strip_code_fences;

/// The Critic only examines the leading candidates.
const TOP_K: usize = 3;

/// Budget for one venue's full risk analysis (weather + events + LLM).
const VENUE_TIMEOUT: Duration = Duration::from_secs(25);

const EVENTS_RADIUS: &str = "1mi";

/// The adversarial analyst: cross-references the top candidates with
/// real-world conditions and looks for dealbreakers.
///
/// Only a dealbreaker on the **top-1** candidate raises the veto that routes
/// the pipeline back to the Commander; secondary findings are recorded in
/// `risk_flags` without triggering a retry.
#[derive(Clone)]
pub struct Critic {
    services: Arc<Services>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    risks: Vec<RiskRecord>,
    #[serde(default)]
    fast_fail: bool,
    #[serde(default)]
    fast_fail_reason: Option<String>,
}

impl Critic {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// The Critic's empty-but-well-shaped contribution.
    pub fn empty_update() -> StateUpdate {
        StateUpdate {
            risk_flags: Some(BTreeMap::new()),
            fast_fail: Some(false),
            fast_fail_reason: Some(None),
            veto: Some(false),
            veto_reason: Some(None),
            ..Default::default()
        }
    }

    pub async fn analyze(&self, state: &PlanState) -> StateUpdate {
        let candidates = &state.candidate_venues;
        if candidates.is_empty() {
            tracing::info!("critic: no candidates to evaluate");
            return Self::empty_update();
        }

        let top = &candidates[..candidates.len().min(TOP_K)];
        let top1_id = top[0].venue_id.clone();

        let mut set = tokio::task::JoinSet::new();
        for venue in top.iter().cloned() {
            let services = Arc::clone(&self.services);
            let intent = state.parsed_intent.clone();
            set.spawn(async move {
                let verdict =
                    match tokio::time::timeout(VENUE_TIMEOUT, analyze_venue(&services, &intent, &venue))
                        .await
                    {
                        Ok(v) => v,
                        Err(_) => {
                            tracing::warn!(venue = %venue.venue_id, "critic venue analysis timed out");
                            RawVerdict::default()
                        }
                    };
                (venue.venue_id, verdict)
            });
        }

        let mut risk_flags: BTreeMap<String, Vec<RiskRecord>> = BTreeMap::new();
        let mut fast_fail = false;
        let mut fast_fail_reason: Option<String> = None;
        while let Some(result) = set.join_next().await {
            let Ok((venue_id, verdict)) = result else {
                continue;
            };
            // Veto rule: only the leading candidate can fail the plan.
            if verdict.fast_fail && venue_id == top1_id {
                fast_fail = true;
                fast_fail_reason = verdict.fast_fail_reason.clone();
            }
            risk_flags.insert(venue_id, verdict.risks);
        }
        for venue in top {
            risk_flags.entry(venue.venue_id.clone()).or_default();
        }

        if fast_fail {
            tracing::warn!(venue = %top1_id, reason = ?fast_fail_reason, "critic vetoed the leading candidate");
            // Record the veto in long-term memory; best-effort.
            let services = Arc::clone(&self.services);
            let venue_id = top1_id.clone();
            let details = json!({
                "reason": fast_fail_reason,
                "risks": risk_flags.get(&top1_id),
            });
            tokio::spawn(async move {
                if let Err(e) = services.memory.log_risk(&venue_id, "veto", &details).await {
                    tracing::warn!(error = %e, "risk logging failed");
                }
            });
        }

        StateUpdate {
            risk_flags: Some(risk_flags),
            fast_fail: Some(fast_fail),
            fast_fail_reason: Some(fast_fail_reason.clone()),
            veto: Some(fast_fail),
            veto_reason: Some(fast_fail_reason),
            ..Default::default()
        }
    }
}

async fn analyze_venue(
    services: &Services,
    intent: &ParsedIntent,
    venue: &VenueRecord,
) -> RawVerdict {
    // Weather and events fetch in parallel; each adapter degrades on its own.
    let (weather, events) = tokio::join!(
        services.weather.forecast(venue.lat, venue.lng),
        services.events.nearby(venue.lat, venue.lng, EVENTS_RADIUS),
    );
    let weather = weather.unwrap_or_else(|e| {
        tracing::warn!(venue = %venue.venue_id, error = %e, "weather fetch failed");
        None
    });
    let events = events.unwrap_or_else(|e| {
        tracing::warn!(venue = %venue.venue_id, error = %e, "events fetch failed");
        Vec::new()
    });

    let prompt = format!(
        r#"You are an adversarial risk critic. Your job is to find reasons why this plan would go badly.
Look for dealbreakers that would ruin the experience.

Context:
User intent: {intent}
Venue: {name} ({category})
Weather profile: {weather}
Upcoming events nearby: {events}

A dealbreaker is e.g. an outdoor activity with heavy rain forecast, or a major event blocking access.
If one exists, trigger a fast-fail.

Output exact JSON, no markdown:
{{"risks": [{{"type": "weather", "severity": "high", "detail": "..."}}], "fast_fail": false, "fast_fail_reason": null}}
risk type is one of weather/event/other; severity is high/medium/low."#,
        intent = json!(intent),
        name = venue.name,
        category = venue.category,
        weather = json!(weather),
        events = json!(events),
    );

    let reply = match services.llm.generate(&prompt, &[]).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::warn!(venue = %venue.venue_id, "LLM unavailable for risk analysis");
            return RawVerdict::default();
        }
        Err(e) => {
            tracing::error!(venue = %venue.venue_id, error = %e, "critic LLM call failed");
            return RawVerdict::default();
        }
    };

    match serde_json::from_str::<RawVerdict>(strip_code_fences(&reply)) {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(venue = %venue.venue_id, error = %e, "critic reply was not valid JSON");
            RawVerdict::default()
        }
    }
}
