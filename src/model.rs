// src/model.rs
//! Canonical match record rebuilt from every snapshot. Nothing in here is persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lifecycle status after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NotStarted,
    Live,
    HalfTime,
    FullTime,
    Cancelled,
    Postponed,
    Unknown,
}

impl MatchStatus {
    /// In play, including the interval.
    pub fn is_in_play(self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::HalfTime)
    }

    /// Cancelled or postponed: nothing further will happen on this fixture.
    pub fn is_called_off(self) -> bool {
        matches!(self, MatchStatus::Cancelled | MatchStatus::Postponed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub fn label(self) -> &'static str {
        match self {
            TeamSide::Home => "Home",
            TeamSide::Away => "Away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// Minute of a goal, with optional stoppage time (`45+2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalMinute {
    pub base: u16,
    pub added: Option<u16>,
}

impl GoalMinute {
    pub fn new(base: u16, added: Option<u16>) -> Self {
        // minAdded = 0 is how the source says "no stoppage time"
        Self {
            base,
            added: added.filter(|a| *a > 0),
        }
    }

    /// Parse `52`, `52'`, `45+2`, `90 + 4'`. Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"^\s*(\d{1,3})\s*(?:\+\s*(\d{1,2}))?\s*'?\s*$").expect("minute regex")
        });
        let caps = re.captures(raw)?;
        let base = caps.get(1)?.as_str().parse().ok()?;
        let added = caps.get(2).and_then(|m| m.as_str().parse().ok());
        Some(Self::new(base, added))
    }
}

impl fmt::Display for GoalMinute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.added {
            Some(added) => write!(f, "{}+{}", self.base, added),
            None => write!(f, "{}", self.base),
        }
    }
}

/// One goal inside a match, in the order the source reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalIncident {
    pub minute: Option<GoalMinute>,
    pub scorer: Option<String>,
    pub team_side: TeamSide,
    #[serde(default)]
    pub assist: Option<String>,
    #[serde(default)]
    pub penalty: bool,
    #[serde(default)]
    pub own_goal: bool,
}

impl GoalIncident {
    pub fn new(minute: Option<GoalMinute>, scorer: Option<String>, team_side: TeamSide) -> Self {
        Self {
            minute,
            scorer,
            team_side,
            assist: None,
            penalty: false,
            own_goal: false,
        }
    }
}

/// Canonical fixture record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub home: String,
    pub away: String,
    pub status: MatchStatus,
    pub kickoff_utc: Option<DateTime<Utc>>,
    pub score: Option<Score>,
    pub competition: Option<String>,
    pub round: Option<String>,
    pub venue: Option<String>,
    /// Source order; see `goals_unknown` before reading an empty list as "no goals".
    pub goals: Vec<GoalIncident>,
    /// True when the source gave no incident data at all.
    pub goals_unknown: bool,
}

impl Match {
    /// Attach goals from a details payload. `None` leaves the match untouched.
    pub fn with_goals(mut self, goals: Option<Vec<GoalIncident>>) -> Self {
        if let Some(goals) = goals {
            self.goals = goals;
            self.goals_unknown = false;
        }
        self
    }

    /// Kickoff distance from `now` in minutes; `None` when kickoff is unknown.
    pub fn minutes_from(&self, now: DateTime<Utc>) -> Option<i64> {
        self.kickoff_utc
            .map(|k| k.signed_duration_since(now).num_minutes())
    }

    pub fn headline(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_parses_stoppage_and_quotes() {
        assert_eq!(GoalMinute::parse("52"), Some(GoalMinute::new(52, None)));
        assert_eq!(GoalMinute::parse("90'"), Some(GoalMinute::new(90, None)));
        assert_eq!(GoalMinute::parse("45+2"), Some(GoalMinute::new(45, Some(2))));
        assert_eq!(GoalMinute::parse(" 90 + 4' "), Some(GoalMinute::new(90, Some(4))));
        assert_eq!(GoalMinute::parse("HT"), None);
        assert_eq!(GoalMinute::parse(""), None);
    }

    #[test]
    fn zero_added_time_is_dropped() {
        let m = GoalMinute::new(55, Some(0));
        assert_eq!(m.to_string(), "55");
        assert_eq!(GoalMinute::new(55, Some(4)).to_string(), "55+4");
    }

    #[test]
    fn stoppage_minutes_sort_after_base() {
        let mut v = vec![
            GoalMinute::new(46, None),
            GoalMinute::new(45, Some(2)),
            GoalMinute::new(45, None),
        ];
        v.sort();
        let s: Vec<String> = v.iter().map(|m| m.to_string()).collect();
        assert_eq!(s, vec!["45", "45+2", "46"]);
    }
}
