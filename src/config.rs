// src/config.rs
//! Tracker configuration: defaults, then an optional TOML/JSON file, then env vars.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "MATCHDAY_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/matchday.toml";
pub const DEFAULT_JSON_PATH: &str = "config/matchday.json";

/// Kickoffs older than this (relative to now) drop out of the routine window.
pub const RECENT_PAST_HOURS: i64 = 4;

/// Ceiling for every minute-valued setting: one week.
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;
/// Ceiling for every hour-valued setting: one year.
pub const MAX_HORIZON_HOURS: i64 = 366 * 24;

/// Non-negative minutes as a `Duration`, saturating instead of overflowing.
pub fn minutes(v: i64) -> Duration {
    Duration::try_minutes(v.max(0)).unwrap_or(Duration::MAX)
}

/// Non-negative hours as a `Duration`, saturating instead of overflowing.
pub fn hours(v: i64) -> Duration {
    Duration::try_hours(v.max(0)).unwrap_or(Duration::MAX)
}

fn default_team_id() -> u64 {
    1_186_081
}
fn default_prematch_window_minutes() -> i64 {
    120
}
fn default_lookahead_hours() -> i64 {
    24
}
fn default_fast_window_before_minutes() -> i64 {
    60
}
fn default_fast_window_after_minutes() -> i64 {
    30
}
fn default_expected_duration_minutes() -> i64 {
    120
}
fn default_fast_poll_interval_minutes() -> i64 {
    5
}
fn default_slow_poll_interval_minutes() -> i64 {
    30
}
fn default_max_finished_age_hours() -> i64 {
    72
}
fn default_display_timezone() -> String {
    "Europe/London".to_string()
}
fn default_state_file() -> PathBuf {
    PathBuf::from(".state/posted_events.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_team_id")]
    pub team_id: u64,
    #[serde(default = "default_prematch_window_minutes")]
    pub prematch_window_minutes: i64,
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    #[serde(default = "default_fast_window_before_minutes")]
    pub fast_window_before_minutes: i64,
    #[serde(default = "default_fast_window_after_minutes")]
    pub fast_window_after_minutes: i64,
    #[serde(default = "default_expected_duration_minutes")]
    pub expected_duration_minutes: i64,
    #[serde(default = "default_fast_poll_interval_minutes")]
    pub fast_poll_interval_minutes: i64,
    #[serde(default = "default_slow_poll_interval_minutes")]
    pub slow_poll_interval_minutes: i64,
    #[serde(default = "default_max_finished_age_hours")]
    pub max_finished_age_hours: i64,
    /// IANA name, e.g. "Europe/London".
    #[serde(default = "default_display_timezone")]
    pub display_timezone: String,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default)]
    pub webhook_url: Option<String>,

    // --- mode flags ---
    #[serde(default)]
    pub dry_run: bool,
    /// Literal message to post instead of running the pipeline.
    #[serde(default)]
    pub test_message: Option<String>,
    #[serde(default)]
    pub force_next_match: bool,
    #[serde(default)]
    pub force_latest_finished: bool,
    /// Bypass dedup for the recap; implies `force_latest_finished`.
    #[serde(default)]
    pub force_repost: bool,
    #[serde(default)]
    pub diagnostic: bool,
    /// Skip routine runs in slow mode unless the wall clock sits on a
    /// slow-interval boundary. For schedulers that fire every few minutes.
    #[serde(default)]
    pub cadence_gate: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            team_id: default_team_id(),
            prematch_window_minutes: default_prematch_window_minutes(),
            lookahead_hours: default_lookahead_hours(),
            fast_window_before_minutes: default_fast_window_before_minutes(),
            fast_window_after_minutes: default_fast_window_after_minutes(),
            expected_duration_minutes: default_expected_duration_minutes(),
            fast_poll_interval_minutes: default_fast_poll_interval_minutes(),
            slow_poll_interval_minutes: default_slow_poll_interval_minutes(),
            max_finished_age_hours: default_max_finished_age_hours(),
            display_timezone: default_display_timezone(),
            state_file: default_state_file(),
            webhook_url: None,
            dry_run: false,
            test_message: None,
            force_next_match: false,
            force_latest_finished: false,
            force_repost: false,
            diagnostic: false,
            cadence_gate: false,
        }
    }
}

impl TrackerConfig {
    /// Full resolution: defaults -> file (if any) -> environment.
    pub fn load() -> Result<Self> {
        let mut cfg = match default_config_path()? {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
    }

    /// Overlay every recognised environment variable that is set.
    pub fn apply_env(&mut self) {
        env_i64("PREMATCH_WINDOW_MINUTES", &mut self.prematch_window_minutes);
        env_i64("MATCH_LOOKAHEAD_HOURS", &mut self.lookahead_hours);
        env_i64("FAST_WINDOW_BEFORE_MINUTES", &mut self.fast_window_before_minutes);
        env_i64("FAST_WINDOW_AFTER_MINUTES", &mut self.fast_window_after_minutes);
        env_i64("EXPECTED_MATCH_DURATION_MINUTES", &mut self.expected_duration_minutes);
        env_i64("FAST_POLL_INTERVAL_MINUTES", &mut self.fast_poll_interval_minutes);
        env_i64("SLOW_POLL_INTERVAL_MINUTES", &mut self.slow_poll_interval_minutes);
        env_i64("MAX_FINISHED_AGE_HOURS", &mut self.max_finished_age_hours);

        if let Some(raw) = env_nonempty("TEAM_ID") {
            match raw.parse() {
                Ok(v) => self.team_id = v,
                Err(_) => tracing::warn!(value = %raw, "TEAM_ID is not a number, keeping {}", self.team_id),
            }
        }
        if let Some(tz) = env_nonempty("DISPLAY_TIMEZONE") {
            self.display_timezone = tz;
        }
        if let Some(p) = env_nonempty("STATE_FILE") {
            self.state_file = PathBuf::from(p);
        }
        if let Some(url) = env_nonempty("DISCORD_WEBHOOK_URL") {
            self.webhook_url = Some(url);
        }
        if let Some(msg) = env_nonempty("DISCORD_TEST_MESSAGE") {
            self.test_message = Some(msg);
        }

        self.dry_run = env_as_bool("DRY_RUN", self.dry_run);
        self.force_next_match = env_as_bool("SEND_NEXT_MATCH_NOW", self.force_next_match);
        self.force_latest_finished =
            env_as_bool("SEND_LATEST_FINISHED_MATCH_NOW", self.force_latest_finished);
        self.force_repost = env_as_bool("FORCE_POST", self.force_repost);
        self.diagnostic = env_as_bool("DEBUG_FOTMOB_PAYLOAD", self.diagnostic);
        self.cadence_gate = env_as_bool("CADENCE_GATE", self.cadence_gate);
    }

    /// Clamp nonsense values into range and check the pieces that can't be defaulted.
    pub fn validate(&mut self) -> Result<()> {
        for (name, slot, min, max) in [
            ("PREMATCH_WINDOW_MINUTES", &mut self.prematch_window_minutes, 0, MAX_WINDOW_MINUTES),
            ("MATCH_LOOKAHEAD_HOURS", &mut self.lookahead_hours, 0, MAX_HORIZON_HOURS),
            ("FAST_WINDOW_BEFORE_MINUTES", &mut self.fast_window_before_minutes, 0, MAX_WINDOW_MINUTES),
            ("FAST_WINDOW_AFTER_MINUTES", &mut self.fast_window_after_minutes, 0, MAX_WINDOW_MINUTES),
            ("EXPECTED_MATCH_DURATION_MINUTES", &mut self.expected_duration_minutes, 0, MAX_WINDOW_MINUTES),
            ("FAST_POLL_INTERVAL_MINUTES", &mut self.fast_poll_interval_minutes, 1, MAX_WINDOW_MINUTES),
            ("SLOW_POLL_INTERVAL_MINUTES", &mut self.slow_poll_interval_minutes, 1, MAX_WINDOW_MINUTES),
            ("MAX_FINISHED_AGE_HOURS", &mut self.max_finished_age_hours, 0, MAX_HORIZON_HOURS),
        ] {
            let clamped = (*slot).clamp(min, max);
            if clamped != *slot {
                tracing::warn!(%name, value = *slot, clamped, "out of range, clamping");
                *slot = clamped;
            }
        }

        self.display_tz()?;
        if !self.dry_run && self.webhook_url.is_none() {
            return Err(anyhow!(
                "Missing required environment variable: DISCORD_WEBHOOK_URL"
            ));
        }
        Ok(())
    }

    pub fn display_tz(&self) -> Result<Tz> {
        self.display_timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown DISPLAY_TIMEZONE {:?}: {e}", self.display_timezone))
    }

    /// Recap mode, either requested directly or implied by force-repost.
    pub fn latest_finished_mode(&self) -> bool {
        self.force_latest_finished || self.force_repost
    }
}

/// `$MATCHDAY_CONFIG_PATH`, then `config/matchday.toml`, then `config/matchday.json`.
fn default_config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<TrackerConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("parsing JSON config");
    }
    toml::from_str(s).context("parsing TOML config")
}

/// `1/true/yes/on` (any case) is true; anything else set is false; unset keeps `default`.
pub fn env_as_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_i64(name: &str, slot: &mut i64) {
    let Some(raw) = env_nonempty(name) else {
        return;
    };
    match raw.parse::<i64>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(%name, value = %raw, "not an integer, keeping {}", slot),
    }
}
