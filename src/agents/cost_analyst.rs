use std::collections::BTreeMap;

use crate::model::{
    CostConfidence, CostRecord, PlanState, PriceBand, StateUpdate, VenueRecord, VenueSource,
};

/// Value score when no price signal exists at all.
const UNKNOWN_VALUE_SCORE: f64 = 0.3;

/// The pricing analyst: a pure, synchronous function of the candidate list.
///
/// It never does I/O, so the fan-out runner offloads it to a worker thread
/// rather than the event loop. Signal combination:
///
/// | signals present | price_range | confidence |
/// |---|---|---|
/// | neither         | null        | none       |
/// | one only        | that value  | medium     |
/// | both, equal     | that value  | high       |
/// | both, differ    | median band | low        |
#[derive(Debug, Clone, Copy, Default)]
pub struct CostAnalyst;

impl CostAnalyst {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, state: &PlanState) -> StateUpdate {
        let profiles: BTreeMap<String, CostRecord> = state
            .candidate_venues
            .iter()
            .map(|v| (v.venue_id.clone(), profile_venue(v)))
            .collect();

        StateUpdate {
            cost_profiles: Some(profiles),
            ..Default::default()
        }
    }
}

fn profile_venue(venue: &VenueRecord) -> CostRecord {
    let google = venue.google_price.or_else(|| {
        (venue.source == VenueSource::GooglePlaces)
            .then_some(venue.price_range)
            .flatten()
    });
    let yelp = venue.yelp_price.or_else(|| {
        (venue.source == VenueSource::Yelp)
            .then_some(venue.price_range)
            .flatten()
    });

    let (price_range, confidence) = match (google, yelp) {
        (None, None) => (None, CostConfidence::None),
        (Some(band), None) | (None, Some(band)) => (Some(band), CostConfidence::Medium),
        (Some(a), Some(b)) if a == b => (Some(a), CostConfidence::High),
        (Some(a), Some(b)) => (Some(median_band(a, b)), CostConfidence::Low),
    };

    let value_score = match price_range {
        Some(band) => band.value_score(),
        None => UNKNOWN_VALUE_SCORE,
    };

    CostRecord {
        price_range,
        confidence,
        value_score,
    }
}

/// The band midway between two conflicting signals, rounding the half-step
/// toward the more expensive band.
fn median_band(a: PriceBand, b: PriceBand) -> PriceBand {
    PriceBand::from_tier((a.tier() + b.tier() + 1) / 2)
}
