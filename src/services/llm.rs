use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Overall budget for one generation call.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for fetching a single inline image.
const PHOTO_TIMEOUT: Duration = Duration::from_secs(8);
/// At most this many images are attached to a multimodal prompt.
const MAX_IMAGES: usize = 3;

/// Text (and optionally multimodal) generation.
///
/// `Ok(None)` means the provider is unavailable or returned nothing usable;
/// callers take their fallback path.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, image_urls: &[String]) -> Result<Option<String>>;
}

// ── Gemini response types ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

// ── Live client ─────────────────────────────────────────────────────

/// Gemini `generateContent` client with inline image parts.
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// Fetch one image and return an inline-data part, or `None` on any
/// failure — a missing photo silently degrades the prompt.
async fn fetch_image_part(client: reqwest::Client, url: String) -> Option<serde_json::Value> {
    let resp = match client.get(&url).timeout(PHOTO_TIMEOUT).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%url, error = %e, "image fetch failed");
            return None;
        }
    };
    let resp = match resp.error_for_status() {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(%url, error = %e, "image fetch returned error status");
            return None;
        }
    };
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();
    let bytes = resp.bytes().await.ok()?;
    Some(json!({
        "inline_data": {
            "mime_type": content_type,
            "data": BASE64.encode(&bytes),
        }
    }))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, prompt: &str, image_urls: &[String]) -> Result<Option<String>> {
        if self.api_key.is_empty() {
            tracing::warn!("LLM api key not set, skipping generation");
            return Ok(None);
        }

        // Fetch images concurrently; each one has its own small timeout and
        // drops out silently on failure.
        let mut parts: Vec<serde_json::Value> = Vec::new();
        if !image_urls.is_empty() {
            let mut set = tokio::task::JoinSet::new();
            for (i, url) in image_urls.iter().take(MAX_IMAGES).enumerate() {
                let client = self.client.clone();
                let url = url.clone();
                set.spawn(async move { (i, fetch_image_part(client, url).await) });
            }
            let mut fetched: Vec<(usize, serde_json::Value)> = Vec::new();
            while let Some(result) = set.join_next().await {
                if let Ok((i, Some(part))) = result {
                    fetched.push((i, part));
                }
            }
            fetched.sort_by_key(|(i, _)| *i);
            parts.extend(fetched.into_iter().map(|(_, part)| part));
        }
        parts.push(json!({ "text": prompt }));

        let url = format!(
            "{GEMINI_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": 0.4,
                "maxOutputTokens": 8192,
            },
        });

        let resp = match self
            .client
            .post(&url)
            .timeout(GENERATE_TIMEOUT)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "LLM request failed");
                return Ok(None);
            }
        };
        let resp = match resp.error_for_status() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "LLM returned error status");
                return Ok(None);
            }
        };
        let data: GenerateResponse = resp
            .json()
            .await
            .context("decoding LLM generate response")?;

        Ok(data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text))
    }
}

/// Strip fenced-code markers an LLM may wrap around JSON output.
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}
