// src/error.rs
//! Domain error taxonomy. Application glue still propagates `anyhow::Result`;
//! these variants are what callers match on.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Payload parsed as JSON but no known fixture container was found.
    #[error("snapshot shape not recognized ({0})")]
    SourceShapeUnrecognized(String),

    /// Window selection found nothing. A normal quiet-run outcome.
    #[error("no qualifying match: {0}")]
    NoQualifyingMatch(String),

    /// Persisted dedup state exists but cannot be trusted.
    #[error("dedup store at {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    /// The notifier reported a non-success; the event stays unrecorded.
    #[error("delivery of {event_id} failed: {reason}")]
    DeliveryFailed { event_id: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TrackerError {
    /// Conditions that end the run with a non-zero exit code.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::StoreCorrupt { .. }
                | TrackerError::DeliveryFailed { .. }
                | TrackerError::Config(_)
        )
    }
}
