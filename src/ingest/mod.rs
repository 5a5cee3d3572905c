// src/ingest/mod.rs
//! Snapshot normalization: any known fixture-list shape in, canonical `Match` records out.
//!
//! Unknown shapes fail closed (zero matches plus a warning). Container items
//! that aren't fixtures, and fixtures that can't be placed in time *and* have no
//! readable status, are dropped and counted; every other missing field becomes
//! an explicit `None`.

pub mod details;
pub mod providers;
pub mod types;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::TrackerError;
use crate::model::{Match, MatchStatus, Score};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "snapshot_fixtures_seen_total",
            "Fixture-like objects found in snapshots."
        );
        describe_counter!(
            "snapshot_fixtures_parsed_total",
            "Fixtures normalized into a Match."
        );
        describe_counter!(
            "snapshot_fixtures_dropped_total",
            "Container items dropped: not a fixture, or neither kickoff nor status."
        );
        describe_counter!(
            "snapshot_shape_unrecognized_total",
            "Snapshots with no known fixture container."
        );
    });
}

/// Diagnostic counters. A report only; nothing branches on these except
/// the explicit diagnostic-mode check in `Normalized::require_matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub fixtures_seen: usize,
    pub parsed: usize,
    pub parsed_with_kickoff: usize,
    /// Filled in by the window selector, not by the normalizer.
    pub parsed_in_window: usize,
    pub dropped: usize,
    /// Short rendering of the first parsed fixture.
    pub sample: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub matches: Vec<Match>,
    pub stats: ParseStats,
    /// Which container the fixtures were found in; `None` when unrecognized.
    pub shape: Option<&'static str>,
}

impl Normalized {
    /// Diagnostic-mode gate: an unrecognized payload, or one whose fixtures all
    /// failed to parse, is an error instead of a quiet run.
    pub fn require_matches(&self) -> Result<(), TrackerError> {
        match self.shape {
            None => Err(TrackerError::SourceShapeUnrecognized(
                "no fixture container found".into(),
            )),
            Some(shape) if self.stats.fixtures_seen > 0 && self.stats.parsed == 0 => {
                Err(TrackerError::SourceShapeUnrecognized(format!(
                    "{} fixtures under {shape} but none parsed",
                    self.stats.fixtures_seen
                )))
            }
            Some(_) => Ok(()),
        }
    }
}

/// The single normalization entry point.
pub fn normalize_fixtures(payload: &Value) -> Normalized {
    ensure_metrics_described();

    let Some((shape, items)) = locate_fixture_list(payload) else {
        tracing::warn!(
            target: "ingest",
            top_level = %top_level_keys(payload),
            "snapshot shape not recognized; yielding zero matches"
        );
        counter!("snapshot_shape_unrecognized_total").increment(1);
        return Normalized {
            matches: Vec::new(),
            stats: ParseStats::default(),
            shape: None,
        };
    };

    let mut stats = ParseStats::default();
    let mut matches = Vec::with_capacity(items.len());
    for item in items {
        stats.fixtures_seen += 1;
        let Some(obj) = pick_match_obj(item) else {
            tracing::debug!(target: "ingest", "dropping container item that is not a fixture object");
            stats.dropped += 1;
            continue;
        };
        match parse_fixture(obj) {
            Some(m) => {
                stats.parsed += 1;
                if m.kickoff_utc.is_some() {
                    stats.parsed_with_kickoff += 1;
                }
                if stats.sample.is_none() {
                    stats.sample = Some(sample_line(&m));
                }
                matches.push(m);
            }
            None => stats.dropped += 1,
        }
    }

    counter!("snapshot_fixtures_seen_total").increment(stats.fixtures_seen as u64);
    counter!("snapshot_fixtures_parsed_total").increment(stats.parsed as u64);
    counter!("snapshot_fixtures_dropped_total").increment(stats.dropped as u64);
    tracing::debug!(
        target: "ingest",
        shape,
        seen = stats.fixtures_seen,
        parsed = stats.parsed,
        with_kickoff = stats.parsed_with_kickoff,
        dropped = stats.dropped,
        "normalized snapshot"
    );

    Normalized {
        matches,
        stats,
        shape: Some(shape),
    }
}

/// Known containers, most specific first.
fn locate_fixture_list(v: &Value) -> Option<(&'static str, &Vec<Value>)> {
    if let Some(arr) = v
        .get("fixtures")
        .and_then(|x| x.get("allFixtures"))
        .and_then(|x| x.get("fixtures"))
        .and_then(|x| x.as_array())
    {
        return Some(("fixtures.allFixtures.fixtures", arr));
    }
    if let Some(arr) = v.get("fixtures").and_then(|x| x.as_array()) {
        return Some(("fixtures", arr));
    }
    if let Some(arr) = v.get("matches").and_then(|x| x.as_array()) {
        return Some(("matches", arr));
    }
    v.as_array().map(|arr| ("array", arr))
}

/// Unwrap `{"match": {..}}` / `{"fixture": {..}}`, or accept a bare fixture.
pub fn pick_match_obj(item: &Value) -> Option<&Value> {
    for key in ["match", "fixture"] {
        if let Some(inner) = item.get(key).filter(|x| x.is_object()) {
            return Some(inner);
        }
    }
    let looks_like_fixture = ["id", "matchId", "status", "home", "homeTeam"]
        .iter()
        .any(|k| item.get(*k).is_some());
    looks_like_fixture.then_some(item)
}

fn parse_fixture(obj: &Value) -> Option<Match> {
    let id = match_id(obj)?;
    let kickoff = first_instant(
        obj,
        &[
            "/status/utcTime",
            "/utcTime",
            "/time/utcTime",
            "/kickoff",
            "/kickoffUtc",
            "/startTime",
            "/startTimestamp",
        ],
    );
    let status = resolve_status(obj);
    if kickoff.is_none() && status.is_none() {
        tracing::debug!(target: "ingest", %id, "dropping fixture without kickoff or status");
        return None;
    }
    let status = match (kickoff, status) {
        (None, _) => MatchStatus::Unknown,
        (Some(_), Some(s)) => s,
        // no flags set and no status text: the fixture hasn't started
        (Some(_), None) if is_bare_status_object(obj) => MatchStatus::NotStarted,
        (Some(_), None) => MatchStatus::Unknown,
    };

    let score = match status {
        MatchStatus::NotStarted => None,
        _ => resolve_score(obj),
    };

    let inline_goals = obj
        .get("goals")
        .and_then(|g| g.as_array())
        .map(|arr| details::goals_from_events(arr, None));

    let mut m = Match {
        id,
        home: team_name(obj, &["home", "homeTeam"]),
        away: team_name(obj, &["away", "awayTeam"]),
        status,
        kickoff_utc: kickoff,
        score,
        competition: first_string(
            obj,
            &[
                "/tournament/name",
                "/league/name",
                "/competition/name",
                "/leagueName",
                "/competition",
            ],
        ),
        round: first_string(
            obj,
            &["/roundName", "/round", "/tournament/roundName", "/tournament/round"],
        ),
        venue: first_string(obj, &["/venue/name", "/venue", "/stadium/name", "/stadium"]),
        goals: Vec::new(),
        goals_unknown: true,
    }
    .with_goals(inline_goals);

    mark_goals_known_when_implied(&mut m);
    Some(m)
}

/// Not started, or a 0-0 scoreline, means the goal list is known to be empty.
pub(crate) fn mark_goals_known_when_implied(m: &mut Match) {
    if !m.goals_unknown {
        return;
    }
    let nil_nil = matches!(m.score, Some(Score { home: 0, away: 0 }));
    if m.status == MatchStatus::NotStarted || nil_nil {
        m.goals.clear();
        m.goals_unknown = false;
    }
}

fn match_id(obj: &Value) -> Option<String> {
    ["id", "matchId"].iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn team_name(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|team| match team {
            Value::String(s) => non_empty(s),
            Value::Object(_) => ["name", "longName", "shortName"]
                .iter()
                .find_map(|n| team.get(*n).and_then(|x| x.as_str()).and_then(non_empty)),
            _ => None,
        })
        .unwrap_or_else(|| "TBD".to_string())
}

const STATUS_FLAGS: [&str; 4] = ["started", "finished", "cancelled", "postponed"];
const STATUS_TEXT_KEYS: [&str; 3] = ["short", "type", "description"];

/// `status` is an object carrying only timing data such as `utcTime`.
fn is_bare_status_object(obj: &Value) -> bool {
    obj.get("status").is_some_and(|status| {
        status.is_object()
            && STATUS_FLAGS
                .iter()
                .all(|k| status.get(*k).and_then(|x| x.as_bool()).is_none())
            && STATUS_TEXT_KEYS
                .iter()
                .all(|k| status.get(*k).and_then(|x| x.as_str()).is_none())
    })
}

/// Status from the FotMob boolean object, or from a free-form status string.
fn resolve_status(obj: &Value) -> Option<MatchStatus> {
    if let Some(status) = obj.get("status").filter(|s| s.is_object()) {
        let flag = |k: &str| status.get(k).and_then(|x| x.as_bool());
        let started = flag("started");
        let finished = flag("finished");
        let cancelled = flag("cancelled");
        let postponed = flag("postponed");
        let reason = status
            .get("reason")
            .and_then(|r| {
                r.get("short")
                    .and_then(|x| x.as_str())
                    .filter(|s| !s.is_empty())
                    .or_else(|| r.get("long").and_then(|x| x.as_str()))
            })
            .unwrap_or_default()
            .to_ascii_uppercase();

        let any_flag = STATUS_FLAGS.iter().any(|k| flag(k).is_some());
        if any_flag {
            if postponed == Some(true) || reason.starts_with("PP") || reason.starts_with("POSTP") {
                return Some(MatchStatus::Postponed);
            }
            if cancelled == Some(true) {
                return Some(MatchStatus::Cancelled);
            }
            if finished == Some(true) {
                return Some(MatchStatus::FullTime);
            }
            if started == Some(true) {
                return Some(if reason == "HT" || reason == "HALFTIME" {
                    MatchStatus::HalfTime
                } else {
                    MatchStatus::Live
                });
            }
            return Some(MatchStatus::NotStarted);
        }
        if let Some(s) = STATUS_TEXT_KEYS
            .iter()
            .find_map(|k| status.get(*k).and_then(|x| x.as_str()))
        {
            return status_from_str(s);
        }
        return None;
    }
    ["status", "statusStr", "state"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(|x| x.as_str()))
        .and_then(status_from_str)
}

pub fn status_from_str(raw: &str) -> Option<MatchStatus> {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let status = match key.as_str() {
        "ns" | "notstarted" | "scheduled" | "fixture" | "upcoming" | "tbd" | "pre" => {
            MatchStatus::NotStarted
        }
        "live" | "inprogress" | "1h" | "2h" | "et" | "playing" | "started" => MatchStatus::Live,
        "ht" | "halftime" => MatchStatus::HalfTime,
        "ft" | "finished" | "fulltime" | "ended" | "aet" | "pen" | "afterpenalties" => {
            MatchStatus::FullTime
        }
        "cancelled" | "canceled" | "canc" | "abandoned" | "ab" => MatchStatus::Cancelled,
        "postponed" | "pp" | "postp" => MatchStatus::Postponed,
        _ => return None,
    };
    Some(status)
}

/// `scoreStr` ("2 - 1") wins over per-team score fields.
fn resolve_score(obj: &Value) -> Option<Score> {
    let from_str = first_string(obj, &["/status/scoreStr", "/scoreStr", "/score"])
        .and_then(|s| parse_score_str(&s));
    if from_str.is_some() {
        return from_str;
    }
    let side = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|t| t.get("score").and_then(as_u32))
    };
    Some(Score {
        home: side(&["home", "homeTeam"])?,
        away: side(&["away", "awayTeam"])?,
    })
}

pub fn parse_score_str(s: &str) -> Option<Score> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re =
        RE.get_or_init(|| Regex::new(r"^\s*(\d+)\s*[-:–]\s*(\d+)\s*$").expect("score regex"));
    let caps = re.captures(s)?;
    Some(Score {
        home: caps.get(1)?.as_str().parse().ok()?,
        away: caps.get(2)?.as_str().parse().ok()?,
    })
}

fn as_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|x| u32::try_from(x).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339, naive ISO (taken as UTC), or unix seconds / milliseconds.
pub fn parse_instant(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            s.parse::<i64>().ok().and_then(from_epoch)
        }
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    }
}

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    if raw <= 0 {
        return None;
    }
    // Anything past ~5138 AD in seconds is really milliseconds.
    if raw > 100_000_000_000 {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}

fn first_instant(obj: &Value, pointers: &[&str]) -> Option<DateTime<Utc>> {
    pointers
        .iter()
        .filter_map(|p| obj.pointer(p))
        .find_map(parse_instant)
}

/// First pointer that resolves to a non-empty string (numbers are stringified).
fn first_string(obj: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| obj.pointer(p))
        .find_map(|v| match v {
            Value::String(s) => non_empty(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn sample_line(m: &Match) -> String {
    format!(
        "id={} {} status={:?} kickoff={}",
        m.id,
        m.headline(),
        m.status,
        m.kickoff_utc
            .map(|k| k.to_rfc3339())
            .unwrap_or_else(|| "-".into())
    )
}

fn top_level_keys(v: &Value) -> String {
    match v {
        Value::Object(map) => map.keys().take(8).cloned().collect::<Vec<_>>().join(","),
        Value::Null => "null".into(),
        other => format!("<{}>", json_kind(other)),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
