use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

const FORECAST_TIMEOUT: Duration = Duration::from_secs(10);

/// Next 8 × 3 h periods = 24 hours of forecast.
const FORECAST_PERIODS: u8 = 8;

/// Conditions that count as heavy precipitation regardless of probability.
const WET_CONDITIONS: [&str; 4] = ["Rain", "Drizzle", "Thunderstorm", "Snow"];

/// One 3-hour forecast period in a compact, prompt-friendly form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub time: String,
    pub condition: String,
    pub description: String,
    pub temp_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    /// Probability of precipitation, 0–1.
    pub pop: f64,
}

/// 24-hour forecast digest for the Critic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherDigest {
    pub forecast_24h: Vec<ForecastPeriod>,
    pub heavy_precipitation_likely: bool,
    pub summary: String,
}

/// Forecast lookup. `Ok(None)` means the provider is unavailable.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn forecast(&self, lat: f64, lng: f64) -> Result<Option<WeatherDigest>>;
}

// ── OpenWeather ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastEntry {
    #[serde(default)]
    dt_txt: String,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    #[serde(default)]
    main: MainReadings,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct MainReadings {
    temp: Option<f64>,
    feels_like: Option<f64>,
}

/// OpenWeather 5-day/3-hour forecast, truncated to the next 24 hours so the
/// Critic reasons about conditions at plan time, not just right now.
pub struct OpenWeatherClient {
    api_key: String,
    client: reqwest::Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn forecast(&self, lat: f64, lng: f64) -> Result<Option<WeatherDigest>> {
        if self.api_key.is_empty() {
            tracing::warn!("weather api key not set");
            return Ok(None);
        }

        let resp = self
            .client
            .get(FORECAST_URL)
            .timeout(FORECAST_TIMEOUT)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("cnt", FORECAST_PERIODS.to_string()),
            ])
            .send()
            .await;

        let data: ForecastResponse = match resp.and_then(|r| r.error_for_status()) {
            Ok(r) => match r.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::error!(error = %e, "decoding forecast response failed");
                    return Ok(None);
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "forecast request failed");
                return Ok(None);
            }
        };

        Ok(Some(digest(data)))
    }
}

fn digest(data: ForecastResponse) -> WeatherDigest {
    let periods: Vec<ForecastPeriod> = data
        .list
        .into_iter()
        .map(|entry| {
            let condition = entry.weather.first();
            ForecastPeriod {
                time: entry.dt_txt,
                condition: condition.map(|w| w.main.clone()).unwrap_or_default(),
                description: condition.map(|w| w.description.clone()).unwrap_or_default(),
                temp_c: entry.main.temp,
                feels_like_c: entry.main.feels_like,
                pop: entry.pop,
            }
        })
        .collect();

    let heavy = periods
        .iter()
        .any(|p| p.pop >= 0.6 || WET_CONDITIONS.contains(&p.condition.as_str()));

    WeatherDigest {
        forecast_24h: periods,
        heavy_precipitation_likely: heavy,
        summary: if heavy {
            "Heavy precipitation expected in the next 24 hours.".to_string()
        } else {
            "No significant precipitation expected.".to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(condition: &str, pop: f64) -> ForecastEntry {
        ForecastEntry {
            dt_txt: "2026-08-01 12:00:00".to_string(),
            weather: vec![WeatherCondition {
                main: condition.to_string(),
                description: String::new(),
            }],
            main: MainReadings::default(),
            pop,
        }
    }

    #[test]
    fn flags_heavy_precipitation_on_probability() {
        let d = digest(ForecastResponse {
            list: vec![entry("Clouds", 0.2), entry("Clouds", 0.7)],
        });
        assert!(d.heavy_precipitation_likely);
    }

    #[test]
    fn flags_heavy_precipitation_on_condition() {
        let d = digest(ForecastResponse {
            list: vec![entry("Snow", 0.1)],
        });
        assert!(d.heavy_precipitation_likely);
    }

    #[test]
    fn clear_forecast_is_not_flagged() {
        let d = digest(ForecastResponse {
            list: vec![entry("Clear", 0.0), entry("Clouds", 0.5)],
        });
        assert!(!d.heavy_precipitation_likely);
        assert_eq!(d.summary, "No significant precipitation expected.");
    }
}
