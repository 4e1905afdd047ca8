use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

const TTS_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

const TTS_TIMEOUT: Duration = Duration::from_secs(30);

/// Text-to-speech synthesis. `Ok(None)` means the provider is unavailable.
#[async_trait]
pub trait TtsClient: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Option<Vec<u8>>>;
}

/// ElevenLabs synthesis returning an MP3 byte stream.
pub struct ElevenLabsClient {
    api_key: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TtsClient for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Option<Vec<u8>>> {
        if self.api_key.is_empty() {
            tracing::warn!("tts api key not set");
            return Ok(None);
        }

        let voice = voice_id.unwrap_or(DEFAULT_VOICE_ID);
        let body = json!({
            "text": text,
            "model_id": "eleven_multilingual_v2",
        });

        let resp = self
            .client
            .post(format!("{TTS_BASE}/{voice}"))
            .timeout(TTS_TIMEOUT)
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await;

        match resp.and_then(|r| r.error_for_status()) {
            Ok(r) => match r.bytes().await {
                Ok(audio) => Ok(Some(audio.to_vec())),
                Err(e) => {
                    tracing::error!(error = %e, "reading tts audio failed");
                    Ok(None)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "tts request failed");
                Ok(None)
            }
        }
    }
}
