use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde_json::Value;

use crate::ingest::types::SnapshotSource;

pub const FOTMOB_API_BASE: &str = "https://www.fotmob.com/api";
const REQUEST_TIMEOUT_SECS: u64 = 20;
const PREVIEW_CHARS: usize = 300;

pub struct FotMobSource {
    mode: Mode,
    debug_payload: bool,
}

enum Mode {
    /// Canned payloads, keyed by match id for details.
    Fixture {
        fixtures: String,
        details: HashMap<String, String>,
    },
    Http {
        base: String,
        client: reqwest::Client,
    },
}

impl FotMobSource {
    pub fn from_fixture(fixtures: &str) -> Self {
        Self {
            mode: Mode::Fixture {
                fixtures: fixtures.to_string(),
                details: HashMap::new(),
            },
            debug_payload: false,
        }
    }

    /// Add a canned details payload for `match_id` (fixture mode only).
    pub fn with_details(mut self, match_id: &str, body: &str) -> Self {
        if let Mode::Fixture { details, .. } = &mut self.mode {
            details.insert(match_id.to_string(), body.to_string());
        }
        self
    }

    pub fn http() -> Result<Self> {
        Self::http_with_base(FOTMOB_API_BASE)
    }

    pub fn http_with_base(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            mode: Mode::Http {
                base: base.trim_end_matches('/').to_string(),
                client,
            },
            debug_payload: false,
        })
    }

    pub fn with_debug_payload(mut self, on: bool) -> Self {
        self.debug_payload = on;
        self
    }

    /// Shared body handling for details: empty or non-JSON is "nothing usable".
    fn parse_details_body(&self, status: u16, content_type: &str, body: &str) -> Option<Value> {
        let trimmed = body.trim();
        let parsed = if trimmed.is_empty() || trimmed == "null" {
            None
        } else {
            serde_json::from_str::<Value>(trimmed).ok()
        };
        if self.debug_payload {
            tracing::info!(
                target: "ingest",
                status_code = status,
                content_type,
                json_parse_ok = parsed.is_some(),
                "matchDetails fetch debug"
            );
            if parsed.is_none() && !trimmed.is_empty() {
                let preview: String = trimmed.chars().take(PREVIEW_CHARS).collect();
                tracing::info!(target: "ingest", %preview, "matchDetails non-JSON preview");
            }
        }
        parsed.filter(|v| v.is_object())
    }
}

#[async_trait]
impl SnapshotSource for FotMobSource {
    async fn team_fixtures(&self, team_id: u64) -> Result<Value> {
        let body = match &self.mode {
            Mode::Fixture { fixtures, .. } => fixtures.clone(),
            Mode::Http { base, client } => {
                let url = format!("{base}/teams");
                let resp = client
                    .get(&url)
                    .query(&[("id", team_id)])
                    .header(USER_AGENT, "Mozilla/5.0")
                    .send()
                    .await
                    .map_err(|e| {
                        counter!("source_errors_total").increment(1);
                        e
                    })
                    .context("team fixtures request failed")?
                    .error_for_status()
                    .context("team fixtures non-2xx")?;
                resp.text().await.context("read team fixtures body")?
            }
        };
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            anyhow::bail!("empty team response for team {team_id}");
        }
        serde_json::from_str(trimmed).context("invalid team json")
    }

    async fn match_details(&self, match_id: &str) -> Result<Option<Value>> {
        match &self.mode {
            Mode::Fixture { details, .. } => Ok(details
                .get(match_id)
                .and_then(|body| self.parse_details_body(200, "application/json", body))),
            Mode::Http { base, client } => {
                let url = format!("{base}/data/matchDetails");
                let resp = client
                    .get(&url)
                    .query(&[("matchId", match_id)])
                    .header(USER_AGENT, "Mozilla/5.0")
                    .send()
                    .await
                    .context("matchDetails request failed")?;
                let status = resp.status();
                let content_type = resp
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = resp.text().await.context("read matchDetails body")?;
                if !status.is_success() {
                    tracing::warn!(target: "ingest", %match_id, %status, "matchDetails non-2xx");
                    return Ok(None);
                }
                Ok(self.parse_details_body(status.as_u16(), &content_type, &body))
            }
        }
    }

    fn name(&self) -> &'static str {
        "FotMob"
    }
}
