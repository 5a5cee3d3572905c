// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use matchday_notifier::{Notification, Notifier, TrackerConfig};

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|e| panic!("missing tests/fixtures/{name}: {e}"))
}

/// 14:00 UTC, one hour before fixture 4002 kicks off.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 14, 0, 0).unwrap()
}

pub fn config() -> TrackerConfig {
    TrackerConfig {
        webhook_url: Some("http://127.0.0.1:9/unused".into()),
        ..TrackerConfig::default()
    }
}

/// Accepts everything, remembers what it saw.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn ids(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.event_id.clone()).collect()
    }

    pub fn contents(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|n| n.content.clone()).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, n: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(n.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Accepts the first `ok_before_failing` posts, then fails every one after.
pub struct FlakyNotifier {
    pub ok_before_failing: usize,
    pub sent: Mutex<Vec<String>>,
}

impl FlakyNotifier {
    pub fn new(ok_before_failing: usize) -> Self {
        Self {
            ok_before_failing,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for FlakyNotifier {
    async fn deliver(&self, n: &Notification) -> Result<()> {
        let mut sent = self.sent.lock().unwrap();
        if sent.len() >= self.ok_before_failing {
            return Err(anyhow!("webhook returned 500"));
        }
        sent.push(n.event_id.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}
