use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::model::{PlanState, StateUpdate, VenueRecord, VibeRecord};
use crate::services::Services;
use crate::services::llm::strip_code_fences;

/// How many venue photos to attach to each multimodal prompt.
const MAX_PHOTOS: usize = 3;

/// The thematic analyst: asks the LLM to score each candidate's fit against
/// the requested vibe, with venue photos attached when available.
///
/// Every candidate gets a record: an unusable LLM reply for a venue becomes
/// the null-score fallback rather than a missing key.
#[derive(Clone)]
pub struct VibeMatcher {
    services: Arc<Services>,
}

#[derive(Debug, Deserialize)]
struct RawVibe {
    #[serde(default)]
    vibe_score: Option<f64>,
    #[serde(default)]
    primary_style: Option<String>,
    #[serde(default)]
    visual_descriptors: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl VibeMatcher {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub async fn analyze(&self, state: &PlanState) -> StateUpdate {
        let mut scores: BTreeMap<String, VibeRecord> = BTreeMap::new();

        if !state.candidate_venues.is_empty() {
            let wanted_vibe = state
                .parsed_intent
                .vibe
                .clone()
                .unwrap_or_else(|| "a good fit for the request".to_string());

            let mut set = tokio::task::JoinSet::new();
            for venue in state.candidate_venues.iter().cloned() {
                let services = Arc::clone(&self.services);
                let vibe = wanted_vibe.clone();
                set.spawn(async move {
                    let record = score_venue(&services, &venue, &vibe).await;
                    (venue.venue_id, record)
                });
            }
            while let Some(result) = set.join_next().await {
                if let Ok((venue_id, record)) = result {
                    scores.insert(venue_id, record);
                }
            }
            // A panicked scoring task leaves its venue unkeyed; backfill so
            // every candidate is present.
            for venue in &state.candidate_venues {
                scores
                    .entry(venue.venue_id.clone())
                    .or_insert_with(VibeRecord::fallback);
            }
        }

        StateUpdate {
            vibe_scores: Some(scores),
            ..Default::default()
        }
    }
}

async fn score_venue(services: &Services, venue: &VenueRecord, wanted_vibe: &str) -> VibeRecord {
    let prompt = format!(
        r#"You are a visual atmosphere analyst. Judge how well this venue matches the vibe "{wanted_vibe}".

Venue: {name} ({category})
Website: {website}

Use the attached photos when present. Output exactly this JSON shape, no markdown:
{{"vibe_score": 0.0, "primary_style": "...", "visual_descriptors": ["..."], "confidence": 0.0}}
vibe_score and confidence are floats from 0.0 to 1.0."#,
        name = venue.name,
        category = venue.category,
        website = venue.website,
    );

    let photos: Vec<String> = venue.photos.iter().take(MAX_PHOTOS).cloned().collect();

    let reply = match services.llm.generate(&prompt, &photos).await {
        Ok(Some(text)) => text,
        Ok(None) => {
            tracing::warn!(venue = %venue.venue_id, "LLM unavailable for vibe scoring");
            return VibeRecord::fallback();
        }
        Err(e) => {
            tracing::error!(venue = %venue.venue_id, error = %e, "vibe LLM call failed");
            return VibeRecord::fallback();
        }
    };

    match serde_json::from_str::<RawVibe>(strip_code_fences(&reply)) {
        Ok(raw) => {
            let vibe_score = raw.vibe_score.map(|s| s.clamp(0.0, 1.0));
            // A null score means the fallback path: confidence must be 0.
            let confidence = if vibe_score.is_some() {
                raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0)
            } else {
                0.0
            };
            VibeRecord {
                vibe_score,
                primary_style: raw.primary_style.unwrap_or_default(),
                visual_descriptors: raw.visual_descriptors.unwrap_or_default(),
                confidence,
            }
        }
        Err(e) => {
            tracing::warn!(venue = %venue.venue_id, error = %e, "vibe reply was not valid JSON");
            VibeRecord::fallback()
        }
    }
}
