use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::error::ApiError;
use super::state::AppState;

/// Optional Bearer authentication against a configured identity provider.
///
/// When no domain/audience is configured, verification is skipped and every
/// request proceeds with empty claims. When configured, a present-but-invalid
/// token is a hard 401; an absent token still yields empty claims — the
/// pipeline never requires auth.
pub struct AuthVerifier {
    domain: Option<String>,
    audience: Option<String>,
    client: reqwest::Client,
    /// Process-wide JWKS cache: filled lazily by at most one concurrent
    /// fetch, then immutable for the life of the process.
    jwks: OnceCell<Jwks>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    #[serde(default)]
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

impl AuthVerifier {
    pub fn new(domain: Option<String>, audience: Option<String>) -> Self {
        Self {
            domain,
            audience,
            client: reqwest::Client::new(),
            jwks: OnceCell::new(),
        }
    }

    async fn fetch_jwks(&self, domain: &str) -> Result<Jwks, ApiError> {
        let url = format!("https://{domain}/.well-known/jwks.json");
        let jwks = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::error!(%url, error = %e, "JWKS fetch failed");
                ApiError::Unavailable("Auth service unavailable".to_string())
            })?
            .json::<Jwks>()
            .await
            .map_err(|e| {
                tracing::error!(%url, error = %e, "JWKS decode failed");
                ApiError::Unavailable("Auth service unavailable".to_string())
            })?;
        tracing::info!(%url, keys = jwks.keys.len(), "JWKS fetched and cached");
        Ok(jwks)
    }

    /// Verify an RS256 token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<serde_json::Value, ApiError> {
        let (Some(domain), Some(audience)) = (self.domain.as_deref(), self.audience.as_deref())
        else {
            tracing::warn!("identity domain or audience not configured, skipping verification");
            return Ok(serde_json::Value::Object(Default::default()));
        };

        let header = decode_header(token)
            .map_err(|_| ApiError::Unauthorized("Invalid token header".to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::Unauthorized("Token has no key id".to_string()))?;

        let jwks = self
            .jwks
            .get_or_try_init(|| self.fetch_jwks(domain))
            .await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or_else(|| ApiError::Unauthorized("Unable to find matching JWT key".to_string()))?;

        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|_| ApiError::Unauthorized("Malformed JWT key".to_string()))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[format!("https://{domain}/")]);

        let data = decode::<serde_json::Value>(token, &key, &validation).map_err(|e| {
            tracing::warn!(error = %e, "JWT validation failed");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;
        Ok(data.claims)
    }
}

/// Extractor for the optional identity claims on a request.
///
/// `None` when no Authorization header was sent; rejects with 401 when a
/// token is present but invalid.
pub struct OptionalClaims(pub Option<serde_json::Value>);

impl FromRequestParts<AppState> for OptionalClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(OptionalClaims(None));
        };

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("invalid authorization format".into()))?;

        let claims = state.auth.verify(token).await?;
        Ok(OptionalClaims(Some(claims)))
    }
}
