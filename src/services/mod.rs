pub mod catalog;
pub mod events;
pub mod llm;
pub mod memory;
pub mod tts;
pub mod weather;

use std::sync::Arc;

use crate::config::Settings;

pub use catalog::CatalogClient;
pub use events::EventsClient;
pub use llm::LlmClient;
pub use memory::MemoryStore;
pub use tts::TtsClient;
pub use weather::WeatherClient;

/// The bundle of external collaborators the pipeline nodes draw on.
///
/// Everything here is a narrow async capability; the nodes never see wire
/// details. Tests swap in hand-rolled mocks.
pub struct Services {
    pub llm: Arc<dyn LlmClient>,
    pub google_places: Arc<dyn CatalogClient>,
    pub yelp: Arc<dyn CatalogClient>,
    pub weather: Arc<dyn WeatherClient>,
    pub events: Arc<dyn EventsClient>,
    pub memory: Arc<dyn MemoryStore>,
    pub tts: Arc<dyn TtsClient>,
}

impl Services {
    /// Wire up the live providers from environment-derived settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            llm: Arc::new(llm::GeminiClient::new(settings.gemini_api_key.clone())),
            google_places: Arc::new(catalog::GooglePlacesClient::new(
                settings.google_places_api_key.clone(),
            )),
            yelp: Arc::new(catalog::YelpClient::new(settings.yelp_api_key.clone())),
            weather: Arc::new(weather::OpenWeatherClient::new(
                settings.openweather_api_key.clone(),
            )),
            events: Arc::new(events::PredictHqClient::new(
                settings.predicthq_api_key.clone(),
            )),
            memory: Arc::new(memory::SnowflakeMemory::new(
                settings.snowflake_account.clone(),
                settings.snowflake_token.clone(),
                settings.snowflake_database.clone(),
                settings.snowflake_schema.clone(),
                settings.snowflake_warehouse.clone(),
            )),
            tts: Arc::new(tts::ElevenLabsClient::new(
                settings.elevenlabs_api_key.clone(),
            )),
        }
    }
}
