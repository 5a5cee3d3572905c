pub mod discord;

use anyhow::Result;
use std::sync::Mutex;

use crate::format::Notification;

pub use discord::DiscordNotifier;

/// Delivery seam. `Ok` means the channel confirmed the post; only then may the
/// caller record the event as posted.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, n: &Notification) -> Result<()>;

    fn name(&self) -> &'static str;

    /// Whether a successful delivery should be written to the dedup store.
    fn is_durable(&self) -> bool {
        true
    }
}

/// Logs each would-be post and keeps a copy. Never durable.
#[derive(Default)]
pub struct DryRunNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl DryRunNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for DryRunNotifier {
    async fn deliver(&self, n: &Notification) -> Result<()> {
        tracing::info!(target: "notify", event_id = %n.event_id, "[DRY_RUN] Would post:\n{}", n.content);
        if let Ok(mut v) = self.sent.lock() {
            v.push(n.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn is_durable(&self) -> bool {
        false
    }
}
