//! Scanner module: probe fan-out, snapshot aggregation, transition detection
//! and the cycle engine that ties them together

pub mod engine;
pub mod pool;
pub mod snapshot;
pub mod transition;

use crate::alert::Alert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use engine::{CycleReport, EngineSettings, MonitorEngine};
pub use pool::ProberPool;
pub use snapshot::{aggregate, ScanSnapshot, SnapshotSummary};
pub use transition::{detect, TransitionEvent};

/// Cumulative counters since the engine was created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Total probes run
    pub total_checks: u64,

    pub successful_checks: u64,

    pub failed_checks: u64,

    /// Cycles that produced a snapshot
    pub cycles: u64,

    /// Cycles that faulted and produced nothing
    pub cycle_faults: u64,

    pub alerts_sent: u64,

    pub alerts_suppressed: u64,

    pub started_at: DateTime<Utc>,

    pub last_scan: Option<DateTime<Utc>>,
}

impl Default for MonitorStats {
    fn default() -> Self {
        Self {
            total_checks: 0,
            successful_checks: 0,
            failed_checks: 0,
            cycles: 0,
            cycle_faults: 0,
            alerts_sent: 0,
            alerts_suppressed: 0,
            started_at: Utc::now(),
            last_scan: None,
        }
    }
}

impl MonitorStats {
    pub fn record_probe(&mut self, success: bool) {
        self.total_checks += 1;
        if success {
            self.successful_checks += 1;
        } else {
            self.failed_checks += 1;
        }
    }

    /// Percentage of successful probes
    pub fn success_rate(&self) -> f64 {
        if self.total_checks > 0 {
            (self.successful_checks as f64 / self.total_checks as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Read-only view published after every cycle for dashboards and reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub snapshot: Option<Arc<ScanSnapshot>>,
    pub stats: MonitorStats,
    /// Most recent admitted alerts, oldest first
    pub recent_alerts: Vec<Alert>,
}
