//! Matchday notifier binary entrypoint.
//! One invocation per scheduler tick: run the pipeline once, log the cadence
//! recommendation, exit. Non-zero exit on corrupt state, bad config or a failed post.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use matchday_notifier::{
    run_once, DedupStore, DiscordNotifier, DryRunNotifier, FotMobSource, Notifier, TrackerConfig,
    TrackerError,
};

const DEFAULT_LOG_FILTER: &str = "tracker=info,store=info,ingest=info,notify=info,warn";

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env in local runs; no-op when absent
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fatal = e
                .downcast_ref::<TrackerError>()
                .map(TrackerError::is_fatal)
                .unwrap_or(true);
            tracing::error!(fatal, "run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cfg = TrackerConfig::load()
        .map_err(|e| TrackerError::Config(format!("{e:#}")))?;
    let now = Utc::now();

    tracing::info!(
        team_id = cfg.team_id,
        dry_run = cfg.dry_run,
        "matchday notifier starting"
    );

    let mut store = DedupStore::open(&cfg.state_file)?;
    tracing::info!(
        state_file = ?store.path(),
        records = store.len(),
        "dedup store ready"
    );
    let source = FotMobSource::http()?.with_debug_payload(cfg.diagnostic);

    let notifier: Box<dyn Notifier> = match (&cfg.webhook_url, cfg.dry_run) {
        (Some(url), false) => Box::new(DiscordNotifier::new(url.clone())),
        _ => Box::new(DryRunNotifier::new()),
    };

    let report = run_once(&cfg, &source, notifier.as_ref(), &mut store, now).await?;

    tracing::info!(
        mode = ?report.mode,
        cadence = ?report.cadence.mode,
        suggested_next_check_in_minutes = report.cadence.suggested_next_check_in_minutes,
        posted = report.posted.len(),
        "run complete"
    );
    let summary = serde_json::to_string(&report).context("serialize run report")?;
    tracing::debug!(%summary, "run report");
    Ok(())
}
