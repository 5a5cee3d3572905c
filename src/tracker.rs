// src/tracker.rs
//! One invocation of the notifier: fetch → normalize → select → diff against
//! the dedup store → format → deliver → record. Nothing here loops or sleeps;
//! the external scheduler decides when the next invocation happens.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::cadence::{CadenceAdvisor, CadenceRecommendation};
use crate::config::{minutes, TrackerConfig};
use crate::error::TrackerError;
use crate::events::{new_events, next_match_event, recap_event, MatchEvent};
use crate::format::{test_notification, Formatter, Notification};
use crate::ingest::details::{details_score_str, extract_goals};
use crate::ingest::types::SnapshotSource;
use crate::ingest::{mark_goals_known_when_implied, normalize_fixtures, parse_score_str, ParseStats};
use crate::model::{Match, MatchStatus};
use crate::notify::Notifier;
use crate::store::DedupStore;
use crate::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    TestMessage,
    NextMatch,
    LatestFinished,
    Routine,
}

impl RunMode {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        if cfg.test_message.is_some() {
            RunMode::TestMessage
        } else if cfg.latest_finished_mode() {
            RunMode::LatestFinished
        } else if cfg.force_next_match {
            RunMode::NextMatch
        } else {
            RunMode::Routine
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    /// Id of the match the run acted on, if any.
    pub selected: Option<String>,
    /// Event ids delivered this run, in delivery order.
    pub posted: Vec<String>,
    /// New events found but not delivered because an earlier one failed.
    pub skipped: usize,
    pub cadence: CadenceRecommendation,
    pub stats: ParseStats,
}

impl RunReport {
    fn new(mode: RunMode, cadence: CadenceRecommendation) -> Self {
        Self {
            mode,
            selected: None,
            posted: Vec::new(),
            skipped: 0,
            cadence,
            stats: ParseStats::default(),
        }
    }
}

pub async fn run_once(
    cfg: &TrackerConfig,
    source: &dyn SnapshotSource,
    notifier: &dyn Notifier,
    store: &mut DedupStore,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let advisor = CadenceAdvisor::from_config(cfg);
    let formatter = Formatter::new(cfg.display_tz()?);
    let mode = RunMode::from_config(cfg);
    let mut report = RunReport::new(mode, advisor.recommend(None, now));

    if let Some(text) = cfg.test_message.as_deref() {
        tracing::info!(target: "tracker", notifier = notifier.name(), "sending test message");
        let n = test_notification(text);
        notifier
            .deliver(&n)
            .await
            .map_err(|e| TrackerError::DeliveryFailed {
                event_id: n.event_id.clone(),
                reason: format!("{e:#}"),
            })?;
        report.posted.push(n.event_id);
        return Ok(report);
    }

    let payload = source
        .team_fixtures(cfg.team_id)
        .await
        .with_context(|| format!("fetch fixtures for team {} from {}", cfg.team_id, source.name()))?;
    let normalized = normalize_fixtures(&payload);
    if cfg.diagnostic {
        tracing::info!(
            target: "tracker",
            shape = normalized.shape.unwrap_or("unrecognized"),
            stats = ?normalized.stats,
            "snapshot parse stats"
        );
        normalized.require_matches()?;
    }
    let matches = normalized.matches;
    report.stats = normalized.stats;
    report.stats.parsed_in_window = window::in_window(&matches, now, cfg.lookahead_hours).len();

    let next_kickoff = window::find_next_upcoming(&matches, now)
        .ok()
        .and_then(|m| m.kickoff_utc);

    let (selected, events) = match mode {
        RunMode::LatestFinished => {
            let m = match window::find_latest_finished(&matches, now, cfg.max_finished_age_hours) {
                Ok(m) => enrich(source, m.clone()).await,
                Err(e) => return quiet(report, e, next_kickoff, &advisor, now),
            };
            let ev = recap_event(&m);
            let events = if cfg.force_repost || !store.contains(&ev.event_id) {
                vec![ev]
            } else {
                Vec::new()
            };
            (m, events)
        }
        RunMode::NextMatch => {
            let m = match window::find_next_upcoming(&matches, now) {
                Ok(m) => m.clone(),
                Err(e) => return quiet(report, e, next_kickoff, &advisor, now),
            };
            let ev = next_match_event(&m);
            let events = if cfg.force_repost || !store.contains(&ev.event_id) {
                vec![ev]
            } else {
                Vec::new()
            };
            (m, events)
        }
        // routine; test-message mode has already returned
        RunMode::Routine | RunMode::TestMessage => {
            let routine = window::select_routine(&matches, now, cfg.lookahead_hours);
            let gate_kickoff = routine.and_then(|m| m.kickoff_utc).or(next_kickoff);
            if cfg.cadence_gate && !advisor.should_run_pipeline(gate_kickoff, now) {
                tracing::info!(target: "tracker", "slow mode off-boundary, skipping pipeline");
                report.cadence = advisor.recommend(gate_kickoff, now);
                return Ok(report);
            }
            let Some(m) = routine else {
                let e = TrackerError::NoQualifyingMatch(format!(
                    "nothing within -{}h/+{}h",
                    crate::config::RECENT_PAST_HOURS,
                    cfg.lookahead_hours
                ));
                return quiet(report, e, next_kickoff, &advisor, now);
            };
            let m = if needs_details(m.status) {
                enrich(source, m.clone()).await
            } else {
                m.clone()
            };
            let events = new_events(&m, now, minutes(cfg.prematch_window_minutes), store);
            (m, events)
        }
    };

    report.selected = Some(selected.id.clone());
    report.cadence = advisor.recommend(selected.kickoff_utc.or(next_kickoff), now);
    tracing::info!(
        target: "tracker",
        mode = ?mode,
        match_id = %selected.id,
        status = ?selected.status,
        fixture = %selected.headline(),
        new_events = events.len(),
        "match selected"
    );

    if events.is_empty() {
        tracing::info!(target: "tracker", match_id = %selected.id, "no new events");
        return Ok(report);
    }

    deliver_in_order(cfg, &formatter, &selected, &events, notifier, store, now, &mut report).await?;
    Ok(report)
}

fn needs_details(status: MatchStatus) -> bool {
    status.is_in_play() || status == MatchStatus::FullTime
}

/// Pull goals (and the details scoreline, which wins over the list's) for one match.
/// A failed or empty details fetch leaves the match as it was.
async fn enrich(source: &dyn SnapshotSource, mut m: Match) -> Match {
    match source.match_details(&m.id).await {
        Ok(Some(details)) => {
            if let Some(score) = details_score_str(&details).and_then(parse_score_str) {
                m.score = Some(score);
            }
            let goals = extract_goals(&details);
            if goals.is_none() {
                tracing::debug!(target: "tracker", match_id = %m.id, "details carry no goal section");
            }
            m = m.with_goals(goals);
        }
        Ok(None) => {
            tracing::debug!(target: "tracker", match_id = %m.id, "no usable match details");
        }
        Err(e) => {
            tracing::warn!(target: "tracker", match_id = %m.id, "match details fetch failed: {e:#}");
        }
    }
    mark_goals_known_when_implied(&mut m);
    m
}

fn quiet(
    mut report: RunReport,
    reason: TrackerError,
    next_kickoff: Option<DateTime<Utc>>,
    advisor: &CadenceAdvisor,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    tracing::info!(target: "tracker", "{reason}");
    report.cadence = advisor.recommend(next_kickoff, now);
    Ok(report)
}

/// Deliver strictly in order, recording each confirmed post before moving on.
/// The first failure stops the run so a later event never lands before an
/// earlier one.
#[allow(clippy::too_many_arguments)]
async fn deliver_in_order(
    cfg: &TrackerConfig,
    formatter: &Formatter,
    m: &Match,
    events: &[MatchEvent],
    notifier: &dyn Notifier,
    store: &mut DedupStore,
    now: DateTime<Utc>,
    report: &mut RunReport,
) -> Result<()> {
    let durable = notifier.is_durable() && !cfg.dry_run;
    for (i, ev) in events.iter().enumerate() {
        let n: Notification = formatter.render(m, ev);
        tracing::debug!(target: "tracker", event_id = %n.event_id, hash = %n.content_hash(), "delivering");

        if let Err(e) = notifier.deliver(&n).await {
            counter!("notifications_failed_total").increment(1);
            report.skipped = events.len() - i - 1;
            tracing::error!(
                target: "tracker",
                event_id = %ev.event_id,
                skipped = report.skipped,
                "delivery failed: {e:#}"
            );
            return Err(TrackerError::DeliveryFailed {
                event_id: ev.event_id.clone(),
                reason: format!("{e:#}"),
            }
            .into());
        }

        counter!("notifications_posted_total").increment(1);
        report.posted.push(ev.event_id.clone());
        if durable {
            store.record(&ev.event_id, now);
            store
                .persist()
                .with_context(|| format!("persist after {}", ev.event_id))?;
        }
    }
    Ok(())
}
