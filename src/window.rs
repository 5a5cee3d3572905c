// src/window.rs
//! # Window Selector
//! Narrows the normalized fixture list down to the match a run should act on.
//!
//! Three modes: routine (nearest match inside the notification window, live
//! matches first), next-match (soonest future kickoff, unbounded), and
//! latest-finished (most recent FullTime/Cancelled within a maximum age).

use chrono::{DateTime, Utc};

use crate::config::{hours, RECENT_PAST_HOURS};
use crate::error::TrackerError;
use crate::model::{Match, MatchStatus};

/// Matches inside the routine notification window, in input order.
pub fn in_window<'a>(
    matches: &'a [Match],
    now: DateTime<Utc>,
    lookahead_hours: i64,
) -> Vec<&'a Match> {
    let lower = now
        .checked_sub_signed(hours(RECENT_PAST_HOURS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let upper = now
        .checked_add_signed(hours(lookahead_hours))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    matches
        .iter()
        .filter(|m| {
            m.status.is_in_play()
                || m.kickoff_utc
                    .is_some_and(|k| lower <= k && k <= upper)
        })
        .collect()
}

/// Routine selection: the single in-window match nearest to `now`.
/// In-play matches win over anything else; ties keep input order.
pub fn select_routine(
    matches: &[Match],
    now: DateTime<Utc>,
    lookahead_hours: i64,
) -> Option<&Match> {
    in_window(matches, now, lookahead_hours)
        .into_iter()
        .min_by_key(|m| {
            let distance = m
                .minutes_from(now)
                .map(i64::abs)
                .unwrap_or(i64::MAX);
            (!m.status.is_in_play(), distance)
        })
}

/// Soonest kickoff strictly after `now`, with no lookahead bound.
pub fn find_next_upcoming(matches: &[Match], now: DateTime<Utc>) -> Result<&Match, TrackerError> {
    matches
        .iter()
        .filter(|m| matches!(m.status, MatchStatus::NotStarted | MatchStatus::Unknown))
        .filter(|m| m.kickoff_utc.is_some_and(|k| k > now))
        .min_by_key(|m| m.kickoff_utc)
        .ok_or_else(|| TrackerError::NoQualifyingMatch("no upcoming fixture".into()))
}

/// Most recently finished (FullTime or Cancelled) match no older than
/// `max_age_hours`. Kickoff stands in for the finish instant.
pub fn find_latest_finished(
    matches: &[Match],
    now: DateTime<Utc>,
    max_age_hours: i64,
) -> Result<&Match, TrackerError> {
    let oldest = now
        .checked_sub_signed(hours(max_age_hours))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    matches
        .iter()
        .filter(|m| matches!(m.status, MatchStatus::FullTime | MatchStatus::Cancelled))
        .filter(|m| m.kickoff_utc.is_some_and(|k| k <= now && k >= oldest))
        .max_by_key(|m| m.kickoff_utc)
        .ok_or_else(|| {
            TrackerError::NoQualifyingMatch(format!(
                "no finished fixture within the last {max_age_hours}h"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(now: DateTime<Utc>, minutes: i64, id: &str, status: MatchStatus) -> Match {
        Match {
            id: id.into(),
            home: "Home".into(),
            away: "Away".into(),
            status,
            kickoff_utc: Some(now + Duration::minutes(minutes)),
            score: None,
            competition: None,
            round: None,
            venue: None,
            goals: Vec::new(),
            goals_unknown: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn routine_picks_nearest_and_prefers_live() {
        let n = now();
        let ms = vec![
            at(n, 500, "far", MatchStatus::NotStarted),
            at(n, 60, "near", MatchStatus::NotStarted),
            at(n, 180, "mid", MatchStatus::NotStarted),
        ];
        assert_eq!(select_routine(&ms, n, 24).unwrap().id, "near");

        let mut with_live = ms.clone();
        with_live.push(at(n, -100, "live", MatchStatus::Live));
        assert_eq!(select_routine(&with_live, n, 24).unwrap().id, "live");
    }

    #[test]
    fn routine_excludes_kickoffs_older_than_four_hours() {
        let n = now();
        let ms = vec![at(n, -4 * 60 - 1, "old", MatchStatus::FullTime)];
        assert!(select_routine(&ms, n, 24).is_none());
        let ms = vec![at(n, -4 * 60, "edge", MatchStatus::FullTime)];
        assert!(select_routine(&ms, n, 24).is_some());
    }

    #[test]
    fn lookahead_edge_is_a_minute_either_way() {
        let n = now();
        let inside = vec![at(n, 24 * 60 - 1, "in", MatchStatus::NotStarted)];
        let outside = vec![at(n, 24 * 60 + 1, "out", MatchStatus::NotStarted)];
        assert_eq!(in_window(&inside, n, 24).len(), 1);
        assert!(in_window(&outside, n, 24).is_empty());
    }

    #[test]
    fn next_upcoming_ignores_lookahead() {
        let n = now();
        let ms = vec![
            at(n, -30, "past", MatchStatus::Live),
            at(n, 10 * 24 * 60, "later", MatchStatus::NotStarted),
            at(n, 5 * 24 * 60, "sooner", MatchStatus::NotStarted),
        ];
        assert_eq!(find_next_upcoming(&ms, n).unwrap().id, "sooner");
        assert!(find_next_upcoming(&ms[..1], n).is_err());
    }

    #[test]
    fn latest_finished_selects_most_recent_within_age() {
        let n = now();
        let ms = vec![
            at(n, -72 * 60, "older", MatchStatus::FullTime),
            at(n, -4 * 60, "newest", MatchStatus::FullTime),
            at(n, 120, "upcoming", MatchStatus::NotStarted),
        ];
        assert_eq!(find_latest_finished(&ms, n, 168).unwrap().id, "newest");

        let very_old = vec![at(n, -10 * 24 * 60, "old", MatchStatus::FullTime)];
        assert!(matches!(
            find_latest_finished(&very_old, n, 24),
            Err(TrackerError::NoQualifyingMatch(_))
        ));
    }

    #[test]
    fn huge_bounds_are_unbounded_not_a_panic() {
        let n = now();
        let ms = vec![
            at(n, -10 * 24 * 60, "old", MatchStatus::FullTime),
            at(n, 400 * 24 * 60, "distant", MatchStatus::NotStarted),
        ];
        assert_eq!(find_latest_finished(&ms, n, 3_000_000_000).unwrap().id, "old");
        assert_eq!(in_window(&ms, n, i64::MAX).len(), 1);
    }
}
