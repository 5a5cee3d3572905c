// src/events.rs
//! # Event State Machine
//! Stateless per run: "what has already happened" is read back from the
//! dedup store each time, never kept in memory between invocations.
//!
//! Stages only move forward: `PreMatch → Live → HalfTime → FullTime`, with
//! `Cancelled` as the alternate terminal. Goals sit between Live and HalfTime
//! in emission order but carry no stage of their own.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{GoalIncident, Match, MatchStatus};
use crate::store::DedupStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    PreMatch,
    Live,
    /// `index` points into `Match::goals`; `key` is the goal's identity key.
    Goal { index: usize, key: String },
    HalfTime,
    FullTime,
    Cancelled,
    /// On-demand post-match summary, keyed apart from FullTime.
    Recap,
    /// On-demand "next fixture" announcement.
    NextMatch,
}

impl EventKind {
    /// Lifecycle stage used for the no-regression rule. Goals and the manual
    /// events have none.
    fn stage(&self) -> Option<u8> {
        match self {
            EventKind::PreMatch => Some(0),
            EventKind::Live => Some(1),
            EventKind::HalfTime => Some(2),
            EventKind::FullTime | EventKind::Cancelled => Some(3),
            EventKind::Goal { .. } | EventKind::Recap | EventKind::NextMatch => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::PreMatch => "prematch",
            EventKind::Live => "live",
            EventKind::Goal { .. } => "goal",
            EventKind::HalfTime => "halftime",
            EventKind::FullTime => "fulltime",
            EventKind::Cancelled => "cancelled",
            EventKind::Recap => "recap",
            EventKind::NextMatch => "nextmatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEvent {
    pub event_id: String,
    pub match_id: String,
    pub kind: EventKind,
}

impl MatchEvent {
    pub fn new(match_id: &str, kind: EventKind) -> Self {
        Self {
            event_id: event_id(match_id, &kind),
            match_id: match_id.to_string(),
            kind,
        }
    }
}

/// Deterministic composite key. The recap keeps the `recap:{id}` form older
/// state files already contain.
pub fn event_id(match_id: &str, kind: &EventKind) -> String {
    match kind {
        EventKind::Goal { key, .. } => format!("{match_id}:goal:{key}"),
        EventKind::Recap => format!("recap:{match_id}"),
        other => format!("{match_id}:{}", other.label()),
    }
}

/// Identity of one goal across snapshots: minute, side, scorer and the
/// ordinal among goals sharing all three.
pub fn goal_identity_key(goal: &GoalIncident, ordinal: usize) -> String {
    let minute = goal
        .minute
        .map(|m| m.to_string())
        .unwrap_or_else(|| "na".to_string());
    let scorer = goal
        .scorer
        .as_deref()
        .map(slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{minute}-{}-{scorer}-{ordinal}",
        goal.team_side.label().to_ascii_lowercase()
    )
}

/// Keys for every goal of a match, in `Match::goals` order.
pub fn goal_keys(goals: &[GoalIncident]) -> Vec<String> {
    goals
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let ordinal = goals[..i]
                .iter()
                .filter(|p| p.minute == g.minute && p.scorer == g.scorer && p.team_side == g.team_side)
                .count();
            goal_identity_key(g, ordinal)
        })
        .collect()
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut dash = false;
    for c in s.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.chars().take(40).collect()
}

/// Everything the current snapshot implies, in emission order, before any
/// dedup filtering.
pub fn candidate_events(m: &Match, now: DateTime<Utc>, prematch_window: Duration) -> Vec<MatchEvent> {
    let mut out = Vec::new();
    let goals = |out: &mut Vec<MatchEvent>| {
        for (index, key) in goal_keys(&m.goals).into_iter().enumerate() {
            out.push(MatchEvent::new(&m.id, EventKind::Goal { index, key }));
        }
    };

    match m.status {
        MatchStatus::NotStarted => {
            let in_prematch = m
                .kickoff_utc
                .is_some_and(|k| {
                    let opens = k
                        .checked_sub_signed(prematch_window)
                        .unwrap_or(DateTime::<Utc>::MIN_UTC);
                    opens <= now && now < k
                });
            if in_prematch {
                out.push(MatchEvent::new(&m.id, EventKind::PreMatch));
            }
        }
        MatchStatus::Live => {
            out.push(MatchEvent::new(&m.id, EventKind::Live));
            goals(&mut out);
        }
        MatchStatus::HalfTime => {
            out.push(MatchEvent::new(&m.id, EventKind::Live));
            goals(&mut out);
            out.push(MatchEvent::new(&m.id, EventKind::HalfTime));
        }
        MatchStatus::FullTime => {
            goals(&mut out);
            out.push(MatchEvent::new(&m.id, EventKind::FullTime));
        }
        MatchStatus::Cancelled | MatchStatus::Postponed => {
            out.push(MatchEvent::new(&m.id, EventKind::Cancelled));
        }
        MatchStatus::Unknown => {}
    }
    out
}

/// Candidates that are neither posted already nor a step backwards from a
/// stage that was.
pub fn new_events(
    m: &Match,
    now: DateTime<Utc>,
    prematch_window: Duration,
    store: &DedupStore,
) -> Vec<MatchEvent> {
    let posted_stage = [
        EventKind::PreMatch,
        EventKind::Live,
        EventKind::HalfTime,
        EventKind::FullTime,
        EventKind::Cancelled,
    ]
    .iter()
    .filter(|k| store.contains(&event_id(&m.id, k)))
    .filter_map(|k| k.stage())
    .max();
    let called_off = store.contains(&event_id(&m.id, &EventKind::Cancelled));

    candidate_events(m, now, prematch_window)
        .into_iter()
        .filter(|ev| !store.contains(&ev.event_id))
        .filter(|ev| match (ev.kind.stage(), posted_stage) {
            // one terminal excludes the other, and everything before it
            (Some(stage), Some(posted)) => stage > posted,
            _ => !called_off,
        })
        .collect()
}

pub fn recap_event(m: &Match) -> MatchEvent {
    MatchEvent::new(&m.id, EventKind::Recap)
}

pub fn next_match_event(m: &Match) -> MatchEvent {
    MatchEvent::new(&m.id, EventKind::NextMatch)
}
