//! Cooldown gate that suppresses repeat alerts for the same target

use crate::network::TargetKind;
use crate::scanner::transition::TransitionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Alert category, derived from the target kind and the new status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HostDown,
    HostUp,
    ServiceDown,
    ServiceUp,
}

impl AlertKind {
    pub fn for_event(event: &TransitionEvent) -> Self {
        match (event.kind(), event.is_recovery()) {
            (TargetKind::Host, false) => AlertKind::HostDown,
            (TargetKind::Host, true) => AlertKind::HostUp,
            (TargetKind::Service, false) => AlertKind::ServiceDown,
            (TargetKind::Service, true) => AlertKind::ServiceUp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::HostDown => "host_down",
            AlertKind::HostUp => "host_up",
            AlertKind::ServiceDown => "service_down",
            AlertKind::ServiceUp => "service_up",
        }
    }

    /// Both directions for one kind of target
    pub fn for_target(kind: TargetKind) -> [AlertKind; 2] {
        match kind {
            TargetKind::Host => [AlertKind::HostDown, AlertKind::HostUp],
            TargetKind::Service => [AlertKind::ServiceDown, AlertKind::ServiceUp],
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, AlertKind::HostDown | AlertKind::ServiceDown)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-(kind, target) cooldown. Entries live as long as the gate; the count is
/// bounded by the configured targets times four kinds.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    last_emitted: HashMap<(AlertKind, String), DateTime<Utc>>,
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// `true` forwards the event, `false` suppresses it.
    ///
    /// Entries are recorded per (kind, target), recoveries included. A
    /// transition is held back while any entry for the same target, in either
    /// direction, is younger than the cooldown, so a flapping target produces
    /// one alert per window.
    pub fn admit(&mut self, event: &TransitionEvent) -> bool {
        let kind = AlertKind::for_event(event);
        let name = &event.target.name;

        for related in AlertKind::for_target(event.kind()) {
            let Some(last) = self.last_emitted.get(&(related, name.clone())) else {
                continue;
            };
            let in_cooldown = match event.observed_at.signed_duration_since(*last).to_std() {
                Ok(elapsed) => elapsed < self.cooldown,
                // Clock went backwards relative to the last alert
                Err(_) => true,
            };
            if in_cooldown {
                log::debug!(
                    "Suppressed {} for {} ({} sent at {}, cooldown {:?})",
                    kind,
                    name,
                    related,
                    last,
                    self.cooldown
                );
                return false;
            }
        }

        self.last_emitted.insert((kind, name.clone()), event.observed_at);
        true
    }

    /// Last admission time for a key, if any
    pub fn last_emitted(&self, kind: AlertKind, name: &str) -> Option<DateTime<Utc>> {
        self.last_emitted.get(&(kind, name.to_string())).copied()
    }

    pub fn clear(&mut self) {
        self.last_emitted.clear();
    }
}
