//! netwatch - host and service liveness monitoring
//!
//! Probes a fixed set of hosts (ICMP) and services (TCP/UDP) with bounded
//! concurrency, folds each round into a snapshot, and raises an alert when a
//! target changes state. Repeated alerts for the same target are held back
//! by a cooldown window.

pub mod alert;
pub mod config;
pub mod error;
pub mod history;
pub mod network;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod scheduler;

// Re-export commonly used types
pub use alert::{Alert, AlertDispatcher, AlertGate, AlertKind};
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use network::{Protocol, Target, TargetKind};
pub use probe::{NetworkProber, Probe, ProbeResult, Status};
pub use scanner::{MonitorEngine, MonitorStats, MonitorStatus, ScanSnapshot, TransitionEvent};
pub use scheduler::{Scheduler, SchedulerState};

pub type Result<T> = std::result::Result<T, MonitorError>;
