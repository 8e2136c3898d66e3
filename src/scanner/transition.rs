//! Up/down transition detection between consecutive snapshots

use crate::network::{Target, TargetKind};
use crate::probe::Status;
use crate::scanner::snapshot::ScanSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change in a target's observed status between two consecutive snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub target: Target,
    pub previous_status: Status,
    pub new_status: Status,
    pub observed_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn kind(&self) -> TargetKind {
        self.target.kind()
    }

    /// down -> up
    pub fn is_recovery(&self) -> bool {
        self.new_status.is_up()
    }
}

/// Diff `current` against `previous`.
///
/// Only targets present in both snapshots with a flipped `success` flag
/// produce an event. First observations and disappearances are silent.
pub fn detect(previous: Option<&ScanSnapshot>, current: &ScanSnapshot) -> Vec<TransitionEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    [TargetKind::Host, TargetKind::Service]
        .into_iter()
        .flat_map(move |kind| {
            current.results(kind).iter().filter_map(move |(name, result)| {
                let before = previous.get(kind, name)?;
                if before.success == result.success {
                    return None;
                }
                Some(TransitionEvent {
                    target: result.target.clone(),
                    previous_status: before.status(),
                    new_status: result.status(),
                    observed_at: current.observed_at,
                })
            })
        })
        .collect()
}
