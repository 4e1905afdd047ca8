use std::env;

/// Provider credentials and identity settings, read from the environment.
///
/// Every credential is optional at startup: an adapter with an empty key
/// degrades to its empty result instead of failing the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub gemini_api_key: String,
    pub google_places_api_key: String,
    pub yelp_api_key: String,
    pub openweather_api_key: String,
    pub predicthq_api_key: String,
    pub elevenlabs_api_key: String,

    /// Identity provider domain (e.g. `tenant.us.auth0.com`) and API
    /// audience. Unset means Bearer tokens are not verified.
    pub auth0_domain: Option<String>,
    pub auth0_audience: Option<String>,

    // Long-term memory store (Snowflake SQL API).
    pub snowflake_account: Option<String>,
    pub snowflake_token: Option<String>,
    pub snowflake_database: String,
    pub snowflake_schema: String,
    pub snowflake_warehouse: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env::var("GOOGLE_CLOUD_API_KEY").unwrap_or_default(),
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY").unwrap_or_default(),
            yelp_api_key: env::var("YELP_API_KEY").unwrap_or_default(),
            openweather_api_key: env::var("OPENWEATHER_API_KEY").unwrap_or_default(),
            predicthq_api_key: env::var("PREDICTHQ_API_KEY").unwrap_or_default(),
            elevenlabs_api_key: env::var("ELEVENLABS_API_KEY").unwrap_or_default(),
            auth0_domain: env::var("AUTH0_DOMAIN").ok().filter(|v| !v.is_empty()),
            auth0_audience: env::var("AUTH0_AUDIENCE").ok().filter(|v| !v.is_empty()),
            snowflake_account: env::var("SNOWFLAKE_ACCOUNT").ok().filter(|v| !v.is_empty()),
            snowflake_token: env::var("SNOWFLAKE_TOKEN").ok().filter(|v| !v.is_empty()),
            snowflake_database: env::var("SNOWFLAKE_DATABASE")
                .unwrap_or_else(|_| "VENUES".to_string()),
            snowflake_schema: env::var("SNOWFLAKE_SCHEMA").unwrap_or_else(|_| "PUBLIC".to_string()),
            snowflake_warehouse: env::var("SNOWFLAKE_WAREHOUSE")
                .unwrap_or_else(|_| "COMPUTE_WH".to_string()),
        }
    }
}
