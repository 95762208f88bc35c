//! Transfer history: one record per finished job

use chrono::{SecondsFormat, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::TransferResult;
use crate::transfer::JobStatus;

/// Rows returned by [`HistoryStore::tail`] when the caller has no preference
pub const DEFAULT_TAIL_ROWS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: String,
    pub action: String,
    pub status: String,
    pub details: String,
    pub bytes: u64,
}

impl HistoryEntry {
    pub fn now(
        action: impl Into<String>,
        status: &JobStatus,
        details: impl Into<String>,
        bytes: u64,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            action: action.into(),
            status: status.to_string(),
            details: details.into(),
            bytes,
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: HistoryEntry) -> TransferResult<()>;

    /// Up to `max_rows` most recent entries, oldest first
    fn tail(&self, max_rows: usize) -> TransferResult<Vec<HistoryEntry>>;
}

/// Append `entry` on the blocking pool. Failures are logged, never returned.
pub async fn record(history: Arc<dyn HistoryStore>, entry: HistoryEntry) {
    let action = entry.action.clone();
    match tokio::task::spawn_blocking(move || history.append(entry)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("history_write_failed: action={} error={}", action, e),
        Err(e) => warn!("history_write_failed: action={} error={}", action, e),
    }
}

/// JSON-lines file, one entry per line
pub struct JsonlHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, entry: HistoryEntry) -> TransferResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn tail(&self, max_rows: usize) -> TransferResult<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(max_rows);
        let mut rows = Vec::with_capacity(lines.len() - start);
        for line in &lines[start..] {
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => rows.push(entry),
                Err(e) => warn!("history_skip_line: path={} error={}", self.path.display(), e),
            }
        }
        Ok(rows)
    }
}

/// Process-local history, for tests and front ends without a data dir
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, entry: HistoryEntry) -> TransferResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }

    fn tail(&self, max_rows: usize) -> TransferResult<Vec<HistoryEntry>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let start = entries.len().saturating_sub(max_rows);
        Ok(entries[start..].to_vec())
    }
}
