// src/cadence.rs
//! # Cadence Advisor
//! Recommends how soon the external scheduler should invoke us again.
//!
//! Fast around the match (`kickoff − before` .. `kickoff + duration + after`,
//! both ends inclusive), slow otherwise or when there is no match at all.
//! Purely informational: nothing here sleeps.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;

use crate::config::{minutes, TrackerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CadenceMode {
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CadenceRecommendation {
    pub mode: CadenceMode,
    pub suggested_next_check_in_minutes: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CadenceAdvisor {
    pub fast_window_before: Duration,
    pub fast_window_after: Duration,
    pub expected_duration: Duration,
    pub fast_interval_minutes: i64,
    pub slow_interval_minutes: i64,
}

impl CadenceAdvisor {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        Self {
            fast_window_before: minutes(cfg.fast_window_before_minutes),
            fast_window_after: minutes(cfg.fast_window_after_minutes),
            expected_duration: minutes(cfg.expected_duration_minutes),
            fast_interval_minutes: cfg.fast_poll_interval_minutes.max(1),
            slow_interval_minutes: cfg.slow_poll_interval_minutes.max(1),
        }
    }

    /// `[activity_start, activity_end]` for a kickoff.
    pub fn activity_window(&self, kickoff: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = kickoff
            .checked_sub_signed(self.fast_window_before)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = self
            .expected_duration
            .checked_add(&self.fast_window_after)
            .and_then(|d| kickoff.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (start, end)
    }

    pub fn recommend(
        &self,
        kickoff: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CadenceRecommendation {
        let fast = kickoff.is_some_and(|k| {
            let (start, end) = self.activity_window(k);
            start <= now && now <= end
        });
        if fast {
            CadenceRecommendation {
                mode: CadenceMode::Fast,
                suggested_next_check_in_minutes: self.fast_interval_minutes,
            }
        } else {
            CadenceRecommendation {
                mode: CadenceMode::Slow,
                suggested_next_check_in_minutes: self.slow_interval_minutes,
            }
        }
    }

    /// For schedulers that fire more often than recommended: always run in
    /// fast mode, and in slow mode only on wall-clock minutes that are a
    /// multiple of the slow interval.
    pub fn should_run_pipeline(&self, kickoff: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self.recommend(kickoff, now).mode {
            CadenceMode::Fast => true,
            CadenceMode::Slow => {
                let minute_of_day = i64::from(now.hour() * 60 + now.minute());
                minute_of_day % self.slow_interval_minutes == 0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn advisor() -> CadenceAdvisor {
        CadenceAdvisor::from_config(&TrackerConfig::default())
    }

    #[test]
    fn fast_inside_window_slow_outside() {
        let t = Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap();
        let a = advisor();
        assert_eq!(a.recommend(Some(t), t - Duration::minutes(30)).mode, CadenceMode::Fast);
        assert_eq!(a.recommend(Some(t), t + Duration::minutes(200)).mode, CadenceMode::Slow);
        assert_eq!(a.recommend(Some(t), t - Duration::minutes(90)).mode, CadenceMode::Slow);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let t = Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap();
        let a = advisor();
        assert_eq!(a.recommend(Some(t), t - Duration::minutes(60)).mode, CadenceMode::Fast);
        assert_eq!(a.recommend(Some(t), t + Duration::minutes(150)).mode, CadenceMode::Fast);
        assert_eq!(a.recommend(Some(t), t + Duration::minutes(151)).mode, CadenceMode::Slow);
    }

    #[test]
    fn no_match_is_slow() {
        let r = advisor().recommend(None, Utc::now());
        assert_eq!(r.mode, CadenceMode::Slow);
        assert_eq!(r.suggested_next_check_in_minutes, 30);
    }

    #[test]
    fn oversized_windows_saturate_at_the_calendar_edges() {
        let cfg = TrackerConfig {
            fast_window_before_minutes: i64::MAX,
            fast_window_after_minutes: i64::MAX,
            ..TrackerConfig::default()
        };
        let a = CadenceAdvisor::from_config(&cfg);
        let t = Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap();
        assert_eq!(
            a.activity_window(t),
            (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
        );
        assert_eq!(a.recommend(Some(t), t - Duration::days(400)).mode, CadenceMode::Fast);
    }

    #[test]
    fn slow_gate_only_fires_on_interval_boundaries() {
        let a = advisor();
        let far = Utc.with_ymd_and_hms(2026, 2, 19, 15, 0, 0).unwrap();
        let off = Utc.with_ymd_and_hms(2026, 2, 14, 10, 7, 0).unwrap();
        let on = Utc.with_ymd_and_hms(2026, 2, 14, 10, 30, 0).unwrap();
        assert!(!a.should_run_pipeline(Some(far), off));
        assert!(a.should_run_pipeline(Some(far), on));
        assert!(a.should_run_pipeline(Some(off + Duration::minutes(40)), off));
    }
}
