// src/format.rs
//! # Notification Formatter
//! Pure `(Match, MatchEvent) -> Notification`. No I/O, no clock: identical
//! inputs always render identical bytes, so `content_hash` is usable as a
//! delivery idempotence key.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::events::{EventKind, MatchEvent};
use crate::model::{GoalIncident, Match, MatchStatus, TeamSide};

pub const GOALS_NOT_AVAILABLE: &str = "⚽ Goals: N/A (source did not provide goal events)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub event_id: String,
    pub content: String,
}

impl Notification {
    /// First 12 bytes of SHA-256 over id and content, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.event_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.content.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(24);
        for b in digest.iter().take(12) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    tz: Tz,
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Europe::London,
        }
    }
}

impl Formatter {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn render(&self, m: &Match, ev: &MatchEvent) -> Notification {
        let lines = match &ev.kind {
            EventKind::PreMatch => vec![
                format!("📣 **Match soon:** {}", m.headline()),
                self.kickoff_line(m),
                competition_line(m, false),
                venue_line(m),
            ],
            EventKind::Live => vec![
                format!("🔴 **Kick-off:** {}", m.headline()),
                format!("📊 Live score: {}", score_text(m)),
                competition_line(m, false),
            ],
            EventKind::Goal { index, .. } => match m.goals.get(*index) {
                Some(goal) => goal_lines(m, goal),
                None => vec![format!("⚽ **GOAL!** {}", m.headline())],
            },
            EventKind::HalfTime => vec![
                format!("⏸️ **Half-time:** {}", m.headline()),
                format!("📊 Score: {}", score_text(m)),
            ],
            EventKind::FullTime => {
                let mut lines = vec![
                    format!("✅ **Full-time:** {}", m.headline()),
                    format!("📊 Final score: {}", score_text(m)),
                ];
                lines.extend(goal_list(m));
                lines.push(competition_line(m, false));
                lines
            }
            EventKind::Cancelled => {
                let head = if m.status == MatchStatus::Postponed {
                    format!("⏳ **Postponed:** {}", m.headline())
                } else {
                    format!("❌ **Cancelled:** {}", m.headline())
                };
                vec![head, self.kickoff_line(m), competition_line(m, false)]
            }
            EventKind::Recap => {
                let mut lines = vec![format!("📋 **Match recap:** {}", m.headline())];
                if m.status.is_called_off() {
                    lines.push(format!("🚫 Status: {:?}", m.status));
                } else {
                    lines.push(format!("📊 Final score: {}", score_text(m)));
                    lines.extend(goal_list(m));
                }
                lines.push(competition_line(m, true));
                lines.push(venue_line(m));
                lines
            }
            EventKind::NextMatch => vec![
                format!("🗓️ **Next match:** {}", m.headline()),
                self.kickoff_line(m),
                competition_line(m, false),
                venue_line(m),
            ],
        };

        Notification {
            event_id: ev.event_id.clone(),
            content: join_lines(lines),
        }
    }

    fn kickoff_line(&self, m: &Match) -> String {
        match m.kickoff_utc {
            Some(k) => format!("🕒 Kickoff ({}): {}", self.tz_label(), self.local(k)),
            None => "🕒 Kickoff: TBC".to_string(),
        }
    }

    fn local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz).format("%d-%m-%Y %H:%M").to_string()
    }

    /// "Europe/London" -> "London".
    fn tz_label(&self) -> String {
        self.tz
            .name()
            .rsplit('/')
            .next()
            .unwrap_or("UTC")
            .replace('_', " ")
    }
}

/// Literal operator message (force-test-message mode). Not deduplicated.
pub fn test_notification(text: &str) -> Notification {
    Notification {
        event_id: "test:message".to_string(),
        content: text.trim().to_string(),
    }
}

fn goal_lines(m: &Match, goal: &GoalIncident) -> Vec<String> {
    let team = match goal.team_side {
        TeamSide::Home => &m.home,
        TeamSide::Away => &m.away,
    };
    let head = match goal.minute {
        Some(min) => format!("⚽ **{min}' GOAL!** {team}"),
        None => format!("⚽ **GOAL!** {team}"),
    };
    let mut lines = vec![
        head,
        format!(
            "👟 Scorer: {}{}",
            goal.scorer.as_deref().unwrap_or("unknown"),
            goal_markers(goal)
        ),
    ];
    if let Some(assist) = &goal.assist {
        lines.push(format!("🅰️ Assist: {assist}"));
    }
    lines.push(format!("📊 {} {} {}", m.home, score_text(m), m.away));
    if m.goals.len() > 1 {
        lines.extend(goal_list(m));
    }
    lines
}

/// The ordered goal list, or the explicit "not available" marker.
fn goal_list(m: &Match) -> Vec<String> {
    if m.goals_unknown {
        return vec![GOALS_NOT_AVAILABLE.to_string()];
    }
    if m.goals.is_empty() {
        return vec!["⚽ Goals: none".to_string()];
    }
    let mut lines = vec!["⚽ Goals:".to_string()];
    for g in &m.goals {
        let minute = g
            .minute
            .map(|x| x.to_string())
            .unwrap_or_else(|| "?".to_string());
        lines.push(format!(
            "• {minute}' {}{} ({})",
            g.scorer.as_deref().unwrap_or("unknown"),
            goal_markers(g),
            g.team_side.label()
        ));
    }
    lines
}

fn goal_markers(g: &GoalIncident) -> String {
    let mut s = String::new();
    if g.penalty {
        s.push_str(" (Pen.)");
    }
    if g.own_goal {
        s.push_str(" (OG)");
    }
    s
}

fn score_text(m: &Match) -> String {
    m.score
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `🏆 League Round 1`, or `🏆 League (Round 1)` in recaps. Empty when neither is known.
fn competition_line(m: &Match, parenthesized_round: bool) -> String {
    match (&m.competition, &m.round) {
        (Some(c), Some(r)) if parenthesized_round => format!("🏆 {c} ({r})"),
        (Some(c), Some(r)) => format!("🏆 {c} {r}"),
        (Some(c), None) => format!("🏆 {c}"),
        (None, Some(r)) => format!("🏆 {r}"),
        (None, None) => String::new(),
    }
}

fn venue_line(m: &Match) -> String {
    m.venue
        .as_deref()
        .map(|v| format!("🏟️ Stadium: {v}"))
        .unwrap_or_default()
}

fn join_lines(lines: Vec<String>) -> String {
    lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{recap_event, MatchEvent};
    use crate::model::{GoalMinute, Score};
    use chrono::TimeZone;

    fn base() -> Match {
        Match {
            id: "4001".into(),
            home: "Hashtag United".into(),
            away: "Opponent".into(),
            status: MatchStatus::FullTime,
            // 15:00 UTC in February is 15:00 in London
            kickoff_utc: Some(Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap()),
            score: Some(Score { home: 2, away: 1 }),
            competition: Some("League".into()),
            round: Some("Round 1".into()),
            venue: Some("Parkside".into()),
            goals: Vec::new(),
            goals_unknown: false,
        }
    }

    #[test]
    fn prematch_has_kickoff_competition_and_stadium() {
        let mut m = base();
        m.status = MatchStatus::NotStarted;
        let n = Formatter::default().render(&m, &MatchEvent::new(&m.id, EventKind::PreMatch));
        assert!(n.content.contains("Match soon"));
        assert!(n.content.contains("🕒 Kickoff (London): 14-02-2026 15:00"));
        assert!(n.content.contains("🏆 League Round 1"));
        assert!(n.content.contains("🏟️ Stadium: Parkside"));
        assert_eq!(n.event_id, "4001:prematch");
    }

    #[test]
    fn kickoff_is_rendered_in_display_timezone() {
        let mut m = base();
        m.kickoff_utc = Some(Utc.with_ymd_and_hms(2026, 7, 1, 18, 30, 0).unwrap());
        let n = Formatter::default().render(&m, &MatchEvent::new(&m.id, EventKind::NextMatch));
        // BST is UTC+1
        assert!(n.content.contains("01-07-2026 19:30"), "{}", n.content);
    }

    #[test]
    fn recap_lists_goals_with_markers() {
        let mut m = base();
        let mut pen = GoalIncident::new(Some(GoalMinute::new(55, Some(2))), Some("Player B".into()), TeamSide::Away);
        pen.penalty = true;
        m.goals = vec![
            GoalIncident::new(Some(GoalMinute::new(12, None)), Some("Player A".into()), TeamSide::Home),
            pen,
        ];
        let n = Formatter::default().render(&m, &recap_event(&m));
        assert!(n.content.contains("Final score: 2-1"));
        assert!(n.content.contains("⚽ Goals:"));
        assert!(n.content.contains("12' Player A (Home)"));
        assert!(n.content.contains("55+2' Player B (Pen.) (Away)"));
        assert!(n.content.contains("🏆 League (Round 1)"));
    }

    #[test]
    fn goal_message_names_scorer_assist_and_running_list() {
        let mut m = base();
        m.status = MatchStatus::Live;
        let mut second = GoalIncident::new(Some(GoalMinute::new(52, None)), Some("Player A".into()), TeamSide::Home);
        second.assist = Some("Player B".into());
        m.goals = vec![
            GoalIncident::new(Some(GoalMinute::new(12, None)), Some("Player C".into()), TeamSide::Away),
            second,
        ];
        let ev = MatchEvent::new(&m.id, EventKind::Goal { index: 1, key: "k".into() });
        let n = Formatter::default().render(&m, &ev);
        assert!(n.content.starts_with("⚽ **52' GOAL!** Hashtag United"));
        assert!(n.content.contains("Scorer: Player A"));
        assert!(n.content.contains("Assist: Player B"));
        assert!(n.content.contains("Hashtag United 2-1 Opponent"));
        assert!(n.content.contains("• 12' Player C (Away)"));
        assert_eq!(n.event_id, "4001:goal:k");
    }

    #[test]
    fn unknown_goals_render_explicit_marker_not_empty_list() {
        let mut m = base();
        m.goals_unknown = true;
        let ft = Formatter::default().render(&m, &MatchEvent::new(&m.id, EventKind::FullTime));
        assert!(ft.content.contains(GOALS_NOT_AVAILABLE));
        assert_eq!(ft.content.matches("N/A").count(), 1);

        m.goals_unknown = false;
        let ft = Formatter::default().render(&m, &MatchEvent::new(&m.id, EventKind::FullTime));
        assert!(ft.content.contains("⚽ Goals: none"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let m = base();
        let ev = MatchEvent::new(&m.id, EventKind::FullTime);
        let a = Formatter::default().render(&m, &ev);
        let b = Formatter::default().render(&m, &ev);
        assert_eq!(a, b);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 24);
    }

    #[test]
    fn missing_optionals_leave_no_blank_lines() {
        let mut m = base();
        m.competition = None;
        m.round = None;
        m.venue = None;
        let n = Formatter::default().render(&m, &recap_event(&m));
        assert!(!n.content.contains("\n\n"));
        assert!(!n.content.contains("🏆"));
    }
}
