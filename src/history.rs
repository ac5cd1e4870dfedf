//! Bounded, durably persisted history of completed sessions.
//!
//! The store is append/evict only: entries are prepended most-recent-first
//! and the oldest entry falls off once the cap is reached. Persistence is
//! best-effort: a missing or corrupt file yields an empty history rather
//! than an error, and a failed write never aborts a session.

use crate::errors::ProbeError;
use crate::results::SessionResult;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One persisted history row, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Completion time in epoch milliseconds.
    pub timestamp: i64,
    /// Mean round-trip time in whole milliseconds.
    pub ping: u64,
    /// Download rate in Mbps, one decimal.
    pub download: f64,
    /// Upload estimate in Mbps, one decimal.
    pub upload: f64,
    /// Jitter in whole milliseconds.
    pub jitter: u64,
    /// Serving node label.
    pub node: String,
    /// ISP label.
    pub isp: String,
}

impl From<&SessionResult> for HistoryEntry {
    fn from(result: &SessionResult) -> Self {
        Self {
            timestamp: result.timestamp.timestamp_millis(),
            ping: result.latency.mean_ms().round() as u64,
            download: round_to_tenth(result.download.mbps()),
            upload: round_to_tenth(result.upload_mbps()),
            jitter: result.latency.jitter_ms().round() as u64,
            node: result.node.clone(),
            isp: result.isp.clone(),
        }
    }
}

fn round_to_tenth(mbps: f64) -> f64 {
    (mbps * 10.0).round() / 10.0
}

/// File-backed store of the most recent session results.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    cap: usize,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    /// Read the persisted log. A missing or corrupt file yields an empty
    /// history; durability is best-effort, not authoritative.
    pub fn load(path: impl Into<PathBuf>, cap: usize) -> Self {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
                Ok(mut entries) => {
                    entries.truncate(cap);
                    entries
                }
                Err(e) => {
                    warn!(
                        "history file {} is corrupt ({}); starting empty",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(
                    "could not read history file {} ({}); starting empty",
                    path.display(),
                    e
                );
                Vec::new()
            }
        };

        Self { path, cap, entries }
    }

    /// Prepend a completed session, evict past the cap, and rewrite the
    /// full list to disk before returning.
    pub fn append(&mut self, entry: HistoryEntry) -> Result<(), ProbeError> {
        self.entries.insert(0, entry);
        self.entries.truncate(self.cap);
        self.persist()
    }

    fn persist(&self) -> Result<(), ProbeError> {
        let json = serde_json::to_string(&self.entries).map_err(|e| {
            ProbeError::persistence("failed to serialize history")
                .with_source(e)
        })?;

        fs::write(&self.path, json).map_err(|e| {
            ProbeError::persistence(format!(
                "failed to write history file {}",
                self.path.display()
            ))
            .with_source(e)
        })
    }

    /// Stored entries, most recent first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
