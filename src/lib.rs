// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod cadence;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod ingest;
pub mod model;
pub mod notify;
pub mod store;
pub mod tracker;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::cadence::{CadenceAdvisor, CadenceMode, CadenceRecommendation};
pub use crate::config::TrackerConfig;
pub use crate::error::TrackerError;
pub use crate::format::{Formatter, Notification};
pub use crate::ingest::providers::fotmob::FotMobSource;
pub use crate::ingest::types::SnapshotSource;
pub use crate::model::{GoalIncident, GoalMinute, Match, MatchStatus, Score, TeamSide};
pub use crate::notify::{DiscordNotifier, DryRunNotifier, Notifier};
pub use crate::store::DedupStore;
pub use crate::tracker::{run_once, RunMode, RunReport};
