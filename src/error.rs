//! Error handling for the netwatch engine
//!
//! Transient probe failures are never errors: they are carried as data in
//! [`crate::probe::ProbeResult`]. The variants below cover configuration
//! defects and faults that abort a setup call or a single scan cycle.

use thiserror::Error;

/// Main error type for monitoring operations
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate {category} target: {name}")]
    DuplicateTarget { category: &'static str, name: String },

    #[error("No enabled targets configured")]
    NoTargets,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Failed to resolve {0}")]
    Resolve(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("History error: {0}")]
    History(String),
}

impl MonitorError {
    /// Whether the error indicates a defect in configuration rather than a runtime fault
    pub fn is_config_defect(&self) -> bool {
        matches!(
            self,
            MonitorError::Config(_) | MonitorError::DuplicateTarget { .. } | MonitorError::NoTargets
        )
    }
}

impl From<toml::de::Error> for MonitorError {
    fn from(e: toml::de::Error) -> Self {
        MonitorError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        MonitorError::History(e.to_string())
    }
}
