use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const EVENTS_URL: &str = "https://api.predicthq.com/v1/events/";

const EVENTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Rank-sorted, at most this many events per venue.
const EVENTS_LIMIT: usize = 5;

/// A nearby scheduled event that could affect a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEvent {
    pub title: String,
    pub category: String,
    pub start: String,
    pub rank: Option<u32>,
}

/// Local-event lookup around a point. Failure degrades to an empty list.
#[async_trait]
pub trait EventsClient: Send + Sync {
    async fn nearby(&self, lat: f64, lng: f64, radius: &str) -> Result<Vec<LocalEvent>>;
}

// ── PredictHQ ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    results: Vec<EventResult>,
}

#[derive(Debug, Deserialize)]
struct EventResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    start: String,
    #[serde(default)]
    rank: Option<u32>,
}

pub struct PredictHqClient {
    api_key: String,
    client: reqwest::Client,
}

impl PredictHqClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventsClient for PredictHqClient {
    async fn nearby(&self, lat: f64, lng: f64, radius: &str) -> Result<Vec<LocalEvent>> {
        if self.api_key.is_empty() {
            tracing::warn!("events api key not set");
            return Ok(Vec::new());
        }

        let limit = EVENTS_LIMIT.to_string();
        let resp = self
            .client
            .get(EVENTS_URL)
            .timeout(EVENTS_TIMEOUT)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("within", format!("{radius}@{lat},{lng}")),
                ("limit", limit),
                ("sort", "rank".to_string()),
            ])
            .send()
            .await;

        let data: EventsResponse = match resp.and_then(|r| r.error_for_status()) {
            Ok(r) => match r.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "decoding events response failed");
                    return Ok(Vec::new());
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "events request failed");
                return Ok(Vec::new());
            }
        };

        Ok(data
            .results
            .into_iter()
            .map(|e| LocalEvent {
                title: e.title,
                category: e.category,
                start: e.start,
                rank: e.rank,
            })
            .collect())
    }
}
