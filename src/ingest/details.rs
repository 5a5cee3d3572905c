// src/ingest/details.rs
//! Goal extraction from per-match detail payloads.
//!
//! Sections are tried in order: `content.shotmap.shots`, `content.matchFacts.events`,
//! `content.incidents`. The first section that exists decides the answer, even if
//! it holds zero goals. No section at all means "goal data unavailable" (`None`).

use serde_json::Value;

use crate::model::{GoalIncident, GoalMinute, TeamSide};

/// Goals found in a details payload, sorted by minute (source order on ties).
pub fn extract_goals(details: &Value) -> Option<Vec<GoalIncident>> {
    let home_id = details
        .pointer("/general/homeTeam/id")
        .and_then(as_i64);
    let content = details.get("content")?;

    let section = content
        .pointer("/shotmap/shots")
        .and_then(|x| x.as_array())
        .or_else(|| {
            content
                .pointer("/matchFacts/events")
                .and_then(|x| x.as_array())
        })
        .or_else(|| content.get("incidents").and_then(|x| x.as_array()))?;

    Some(goals_from_events(section, home_id))
}

/// Score string from the details header, e.g. `"1 - 0"`.
pub fn details_score_str(details: &Value) -> Option<&str> {
    details
        .pointer("/general/status/scoreStr")
        .or_else(|| details.pointer("/header/status/scoreStr"))
        .and_then(|x| x.as_str())
}

/// Keep only goal-typed entries and map each onto a `GoalIncident`.
pub fn goals_from_events(events: &[Value], home_id: Option<i64>) -> Vec<GoalIncident> {
    let mut goals: Vec<GoalIncident> = events
        .iter()
        .filter(|e| is_goal(e))
        .filter_map(|e| {
            let side = goal_side(e, home_id);
            if side.is_none() {
                tracing::debug!(target: "ingest", event = %e, "goal without resolvable side, skipping");
            }
            let mut g = GoalIncident::new(goal_minute(e), scorer(e), side?);
            g.assist = str_field(e, &["assistPlayerName", "assistInput", "assist"]);
            g.penalty = bool_field(e, "isPenalty")
                || str_field(e, &["situation", "goalDescription"])
                    .is_some_and(|s| s.to_ascii_lowercase().contains("pen"));
            g.own_goal = bool_field(e, "isOwnGoal") || bool_field(e, "ownGoal");
            Some(g)
        })
        .collect();
    // Stable: equal minutes keep source order; unknown minutes go last.
    goals.sort_by_key(|g| (g.minute.is_none(), g.minute));
    goals
}

fn is_goal(e: &Value) -> bool {
    ["eventType", "type", "incidentType"]
        .iter()
        .filter_map(|k| e.get(*k).and_then(|x| x.as_str()))
        .any(|t| t.eq_ignore_ascii_case("goal"))
}

fn goal_minute(e: &Value) -> Option<GoalMinute> {
    let added = ["minAdded", "overloadTime", "addedTime"]
        .iter()
        .find_map(|k| e.get(*k).and_then(as_i64))
        .and_then(|x| u16::try_from(x).ok());
    for key in ["min", "minute", "time", "timeStr"] {
        match e.get(key) {
            Some(Value::Number(n)) => {
                if let Some(base) = n.as_u64().and_then(|x| u16::try_from(x).ok()) {
                    return Some(GoalMinute::new(base, added));
                }
            }
            Some(Value::String(s)) => {
                if let Some(mut m) = GoalMinute::parse(s) {
                    if m.added.is_none() {
                        m = GoalMinute::new(m.base, added);
                    }
                    return Some(m);
                }
            }
            _ => {}
        }
    }
    None
}

fn scorer(e: &Value) -> Option<String> {
    str_field(e, &["playerName", "fullName", "name"]).or_else(|| {
        e.get("player")
            .and_then(|p| p.get("name"))
            .and_then(|n| match n {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => n.get("fullName").and_then(|x| x.as_str()).map(String::from),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
    })
}

fn goal_side(e: &Value, home_id: Option<i64>) -> Option<TeamSide> {
    if let (Some(team), Some(home)) = (e.get("teamId").and_then(as_i64), home_id) {
        return Some(if team == home {
            TeamSide::Home
        } else {
            TeamSide::Away
        });
    }
    let is_home = e
        .get("isHome")
        .and_then(|x| x.as_bool())
        .or_else(|| e.get("isHomeTeam").and_then(|x| x.as_bool()));
    if let Some(h) = is_home {
        return Some(if h { TeamSide::Home } else { TeamSide::Away });
    }
    match e.get("side").and_then(|x| x.as_str()) {
        Some(s) if s.eq_ignore_ascii_case("home") => Some(TeamSide::Home),
        Some(s) if s.eq_ignore_ascii_case("away") => Some(TeamSide::Away),
        _ => None,
    }
}

fn str_field(e: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| e.get(*k).and_then(|x| x.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn bool_field(e: &Value, key: &str) -> bool {
    e.get(key).and_then(|x| x.as_bool()).unwrap_or(false)
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
