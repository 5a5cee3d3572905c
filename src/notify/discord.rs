use super::Notifier;
use crate::format::Notification;
use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Discord caps message content at 2000 characters.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(20),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn backoff(attempt: u8) {
        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, n: &Notification) -> Result<()> {
        let payload = DiscordWebhookPayload::text(&n.content);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    if status.is_success() {
                        tracing::info!(target: "notify", event_id = %n.event_id, %status, "posted to Discord");
                        return Ok(());
                    }
                    // other 4xx won't get better on retry
                    let transient =
                        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    if transient && attempt < self.max_retries {
                        tracing::warn!(target: "notify", event_id = %n.event_id, %status, attempt, "Discord webhook retry");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("Discord webhook HTTP error: {status} {body}"));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::warn!(target: "notify", event_id = %n.event_id, attempt, "Discord webhook request error: {e}");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(anyhow!("Discord webhook request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    content: String,
}

impl DiscordWebhookPayload {
    fn text(content: &str) -> Self {
        let content = if content.chars().count() > MAX_CONTENT_CHARS {
            let mut cut: String = content.chars().take(MAX_CONTENT_CHARS - 1).collect();
            cut.push('…');
            cut
        } else {
            content.to_string()
        };
        Self { content }
    }
}
