use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

const STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-term memory: advisory context lookup before planning and optional
/// risk logging after a veto. Both operations are best-effort; callers
/// tolerate failure.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>>;

    async fn log_risk(
        &self,
        venue_id: &str,
        risk_type: &str,
        details: &serde_json::Value,
    ) -> Result<()>;
}

// ── Snowflake SQL API ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// Memory store backed by Snowflake's SQL statement API.
/// Unconfigured deployments get an inert store that returns empty context.
pub struct SnowflakeMemory {
    account: Option<String>,
    token: Option<String>,
    database: String,
    schema: String,
    warehouse: String,
    client: reqwest::Client,
}

impl SnowflakeMemory {
    pub fn new(
        account: Option<String>,
        token: Option<String>,
        database: String,
        schema: String,
        warehouse: String,
    ) -> Self {
        Self {
            account,
            token,
            database,
            schema,
            warehouse,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> Option<(String, &str)> {
        match (self.account.as_deref(), self.token.as_deref()) {
            (Some(account), Some(token)) => Some((
                format!("https://{account}.snowflakecomputing.com/api/v2/statements"),
                token,
            )),
            _ => None,
        }
    }

    async fn execute(&self, statement: String) -> Result<StatementResponse> {
        let (url, token) = self
            .endpoint()
            .context("memory store not configured")?;
        let body = json!({
            "statement": statement,
            "database": self.database,
            "schema": self.schema,
            "warehouse": self.warehouse,
        });
        let resp = self
            .client
            .post(&url)
            .timeout(STATEMENT_TIMEOUT)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("memory statement request")?
            .error_for_status()
            .context("memory statement status")?;
        resp.json().await.context("decoding memory response")
    }
}

#[async_trait]
impl MemoryStore for SnowflakeMemory {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        if self.endpoint().is_none() {
            return Ok(Vec::new());
        }
        let escaped = query.replace('\'', "''");
        let statement = format!(
            "SELECT context_chunk FROM venue_knowledge_base \
             WHERE SEARCH_MATCH(context_chunk, '{escaped}') > 0.5 LIMIT {top_k}"
        );
        let resp = self.execute(statement).await?;
        Ok(resp.data.into_iter().flatten().flatten().collect())
    }

    async fn log_risk(
        &self,
        venue_id: &str,
        risk_type: &str,
        details: &serde_json::Value,
    ) -> Result<()> {
        if self.endpoint().is_none() {
            return Ok(());
        }
        let venue_id = venue_id.replace('\'', "''");
        let risk_type = risk_type.replace('\'', "''");
        let details = details.to_string().replace('\'', "''");
        let statement = format!(
            "INSERT INTO risk_history (venue_id, risk_type, details) \
             SELECT '{venue_id}', '{risk_type}', PARSE_JSON('{details}')"
        );
        self.execute(statement).await?;
        Ok(())
    }
}
