// src/store.rs
//! # Dedup Store
//! Durable `event_id -> posted_at` set. Read fully once at start, appended to
//! after each confirmed delivery, never rewritten in place.
//!
//! On disk (v3):
//! ```json
//! {"schema_version": 3, "posted": {"4001:fulltime": {"posted_at": "2026-02-14T17:02:11Z"}}}
//! ```
//! Older layouts still load: a bare JSON array of ids, and the v2 object
//! `{"schema_version": 2, "posted_event_ids": [...]}`. Unknown fields are ignored.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub const SCHEMA_VERSION: u32 = 3;

/// An object state file must carry at least one of these.
const STATE_KEYS: [&str; 3] = ["schema_version", "posted", "posted_event_ids"];

/// One durable dedup record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedEvent {
    pub event_id: String,
    /// `None` for ids migrated from layouts that never stored a timestamp.
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PostedMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    posted: BTreeMap<String, PostedMeta>,
    /// v2 only; read, never written.
    #[serde(default, skip_serializing)]
    posted_event_ids: Vec<String>,
}

// Tolerant variants of what may be on disk.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredState {
    Legacy(Vec<String>),
    Versioned(StateFile),
}

#[derive(Debug, Default)]
pub struct DedupStore {
    path: Option<PathBuf>,
    posted: BTreeMap<String, PostedMeta>,
    unsaved: usize,
}

impl DedupStore {
    /// Store that never touches disk (dry runs, tests).
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. Missing or blank file is a cold start; anything that
    /// is present but unreadable is `StoreCorrupt`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        let path = path.into();
        let corrupt = |reason: String| TrackerError::StoreCorrupt {
            path: path.clone(),
            reason,
        };

        let raw = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(target: "store", path = %path.display(), "no dedup state yet (cold start)");
                return Ok(Self {
                    path: Some(path),
                    ..Self::default()
                });
            }
            Err(e) => return Err(corrupt(format!("read failed: {e}"))),
        };

        let posted = if raw.trim().is_empty() {
            BTreeMap::new()
        } else {
            let value: serde_json::Value =
                serde_json::from_str(&raw).map_err(|e| corrupt(format!("parse failed: {e}")))?;
            if let Some(obj) = value.as_object() {
                if !STATE_KEYS.iter().any(|k| obj.contains_key(*k)) {
                    return Err(corrupt(format!(
                        "object has none of the keys {}",
                        STATE_KEYS.join(", ")
                    )));
                }
            }
            let state: StoredState = serde_json::from_value(value)
                .map_err(|e| corrupt(format!("parse failed: {e}")))?;
            match state {
                StoredState::Legacy(ids) => ids
                    .into_iter()
                    .map(|id| (id, PostedMeta::default()))
                    .collect(),
                StoredState::Versioned(file) => {
                    let mut posted = file.posted;
                    for id in file.posted_event_ids {
                        posted.entry(id).or_default();
                    }
                    posted
                }
            }
        };

        tracing::info!(target: "store", path = %path.display(), records = posted.len(), "dedup state loaded");
        Ok(Self {
            path: Some(path),
            posted,
            unsaved: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.posted.contains_key(event_id)
    }

    /// Insert `event_id`. Returns `false` (and changes nothing) if it was
    /// already present.
    pub fn record(&mut self, event_id: &str, posted_at: DateTime<Utc>) -> bool {
        if self.posted.contains_key(event_id) {
            return false;
        }
        self.posted.insert(
            event_id.to_string(),
            PostedMeta {
                posted_at: Some(posted_at),
            },
        );
        self.unsaved += 1;
        true
    }

    pub fn get(&self, event_id: &str) -> Option<PostedEvent> {
        self.posted.get(event_id).map(|meta| PostedEvent {
            event_id: event_id.to_string(),
            posted_at: meta.posted_at,
        })
    }

    pub fn len(&self) -> usize {
        self.posted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.is_empty()
    }

    pub fn has_unsaved(&self) -> bool {
        self.unsaved > 0
    }

    /// Write the whole set to a sibling temp file, fsync, then rename over the
    /// real file. A crash at any point leaves either the old or the new file.
    pub fn persist(&mut self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            self.unsaved = 0;
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("create state dir {}", dir.display()))?;
        }

        let file = StateFile {
            schema_version: SCHEMA_VERSION,
            posted: self.posted.clone(),
            posted_event_ids: Vec::new(),
        };
        let json = serde_json::to_vec_pretty(&file).context("serialize dedup state")?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut f = File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(&json).context("write dedup state")?;
            f.sync_all().context("fsync dedup state")?;
        }
        fs::rename(&tmp, path).context("swap dedup state")?;

        tracing::debug!(target: "store", records = self.posted.len(), flushed = self.unsaved, "dedup state persisted");
        self.unsaved = 0;
        Ok(())
    }
}
