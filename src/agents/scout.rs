use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::graph::{Node, NodeName, PipelineError};
use crate::model::{PlanState, StateUpdate, VenueRecord, VenueSource};
use crate::services::{Services, catalog::SEARCH_TIMEOUT};

/// Candidate list cap after deduplication.
const MAX_CANDIDATES: usize = 10;

/// Two records within this distance and with matching names are the same
/// venue seen from two catalogs.
const DEDUP_RADIUS_M: f64 = 75.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// The discovery node: queries both venue catalogs concurrently, merges and
/// deduplicates the results, and caps the candidate list.
///
/// One catalog failing is routine; both failing yields an empty candidate
/// list, not an error.
pub struct ScoutNode {
    services: Arc<Services>,
}

impl ScoutNode {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl Node for ScoutNode {
    fn name(&self) -> NodeName {
        NodeName::Scout
    }

    async fn run(&self, snapshot: &PlanState) -> Result<StateUpdate, PipelineError> {
        let intent = &snapshot.parsed_intent;
        let activity = intent
            .activity
            .clone()
            .unwrap_or_else(|| snapshot.raw_prompt.clone());
        let location = intent.location.clone().unwrap_or_default();

        let (google, yelp) = tokio::join!(
            timeout(
                SEARCH_TIMEOUT,
                self.services.google_places.search(&activity, &location),
            ),
            timeout(
                SEARCH_TIMEOUT,
                self.services.yelp.search(&activity, &location),
            ),
        );

        let mut merged: Vec<VenueRecord> = Vec::new();
        for (name, result) in [("google_places", google), ("yelp", yelp)] {
            match result {
                Ok(Ok(venues)) => {
                    for venue in venues {
                        merge_candidate(&mut merged, venue);
                    }
                }
                Ok(Err(e)) => tracing::warn!(catalog = name, error = %e, "catalog search failed"),
                Err(_) => tracing::warn!(catalog = name, "catalog search timed out"),
            }
        }
        merged.truncate(MAX_CANDIDATES);

        tracing::info!(candidates = merged.len(), %activity, "scout discovery complete");
        Ok(StateUpdate {
            candidate_venues: Some(merged),
            ..Default::default()
        })
    }
}

/// Insert `incoming` into `merged`, deduplicating against records already
/// present. On a duplicate hit the higher-rated record wins its position in
/// the list, and the two catalogs' price signals are both preserved so the
/// cost analyst can compare them.
fn merge_candidate(merged: &mut Vec<VenueRecord>, mut incoming: VenueRecord) {
    set_source_price(&mut incoming);

    if let Some(existing) = merged.iter_mut().find(|v| is_same_venue(v, &incoming)) {
        let (google_price, yelp_price) = (
            existing.google_price.or(incoming.google_price),
            existing.yelp_price.or(incoming.yelp_price),
        );
        if incoming.rating > existing.rating {
            *existing = incoming;
        }
        existing.google_price = google_price;
        existing.yelp_price = yelp_price;
        return;
    }
    merged.push(incoming);
}

fn set_source_price(venue: &mut VenueRecord) {
    match venue.source {
        VenueSource::GooglePlaces => venue.google_price = venue.google_price.or(venue.price_range),
        VenueSource::Yelp => venue.yelp_price = venue.yelp_price.or(venue.price_range),
    }
}

fn is_same_venue(a: &VenueRecord, b: &VenueRecord) -> bool {
    a.name.trim().eq_ignore_ascii_case(b.name.trim())
        && haversine_m(a.lat, a.lng, b.lat, b.lng) <= DEDUP_RADIUS_M
}

/// Great-circle distance between two points in meters.
fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
