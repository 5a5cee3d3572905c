// src/ingest/types.rs
use anyhow::Result;
use serde_json::Value;

/// Where snapshots come from. Transport concerns (timeouts, retries, headers)
/// stay behind this trait.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Raw team fixtures payload for `team_id`.
    async fn team_fixtures(&self, team_id: u64) -> Result<Value>;

    /// Per-match details payload, or `None` when the source has nothing usable.
    async fn match_details(&self, match_id: &str) -> Result<Option<Value>>;

    fn name(&self) -> &'static str;
}
