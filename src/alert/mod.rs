//! Alerting: cooldown gating and delivery of admitted transitions

pub mod gate;
pub mod sink;

pub use gate::{AlertGate, AlertKind, DEFAULT_COOLDOWN};
pub use sink::{AlertDispatcher, AlertSink, ConsoleSink, LogSink};

use crate::network::Target;
use crate::probe::Status;
use crate::scanner::transition::TransitionEvent;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// A transition that passed the gate, with enough context to render a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub target: Target,
    pub previous_status: Status,
    pub new_status: Status,
    pub observed_at: DateTime<Utc>,
    pub message: String,
}

impl Alert {
    pub fn from_event(event: &TransitionEvent) -> Self {
        let kind = AlertKind::for_event(event);
        Self {
            kind,
            target: event.target.clone(),
            previous_status: event.previous_status,
            new_status: event.new_status,
            observed_at: event.observed_at,
            message: render_message(kind, &event.target, event.observed_at),
        }
    }
}

/// Human-readable alert line
pub fn render_message(kind: AlertKind, target: &Target, observed_at: DateTime<Utc>) -> String {
    let timestamp = observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let port = target.port.map(|p| p.to_string()).unwrap_or_default();
    match kind {
        AlertKind::ServiceDown => format!(
            "[{}] SERVICE DOWN: {} on {}:{} is not responding",
            timestamp, target.name, target.address, port
        ),
        AlertKind::ServiceUp => format!(
            "[{}] SERVICE RECOVERED: {} on {}:{} is back online",
            timestamp, target.name, target.address, port
        ),
        AlertKind::HostDown => format!(
            "[{}] HOST DOWN: {} ({}) is unreachable",
            timestamp, target.name, target.address
        ),
        AlertKind::HostUp => format!(
            "[{}] HOST RECOVERED: {} ({}) is back online",
            timestamp, target.name, target.address
        ),
    }
}
