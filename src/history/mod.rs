//! Status history persistence
//!
//! Each completed cycle can be handed to one or more [`SnapshotSink`]s. The
//! bundled [`HistoryStore`] keeps a bounded JSON array of recent snapshots on
//! disk for dashboards and reports.

use crate::scanner::{MonitorStats, ScanSnapshot, SnapshotSummary};
use crate::MonitorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Consumer of every completed snapshot
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, snapshot: &ScanSnapshot, stats: &MonitorStats) -> crate::Result<()>;
}

/// One persisted cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub summary: SnapshotSummary,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub failed_checks: u64,
    pub snapshot: ScanSnapshot,
}

/// JSON file holding the most recent `max_entries` cycles
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    /// Create the store, making the parent directory if needed
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> crate::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            max_entries: max_entries.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, oldest first. A missing file is an empty history.
    pub async fn load(&self) -> crate::Result<Vec<HistoryEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn latest(&self) -> crate::Result<Option<HistoryEntry>> {
        Ok(self.load().await?.pop())
    }

    pub async fn append(&self, entry: HistoryEntry) -> crate::Result<()> {
        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(MonitorError::History(reason)) => {
                log::warn!(
                    "Discarding unreadable history at {}: {}",
                    self.path.display(),
                    reason
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        entries.push(entry);
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }

        // Write-then-rename so readers never see a torn file
        let json = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSink for HistoryStore {
    fn name(&self) -> &str {
        "history"
    }

    async fn record(&self, snapshot: &ScanSnapshot, stats: &MonitorStats) -> crate::Result<()> {
        self.append(HistoryEntry {
            timestamp: snapshot.observed_at,
            summary: snapshot.summary(),
            total_checks: stats.total_checks,
            successful_checks: stats.successful_checks,
            failed_checks: stats.failed_checks,
            snapshot: snapshot.clone(),
        })
        .await
    }
}
