//! Assembly of per-target probe results into one immutable scan snapshot

use crate::network::TargetKind;
use crate::probe::ProbeResult;
use crate::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Aggregated result of one full scan cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub observed_at: DateTime<Utc>,
    pub host_results: BTreeMap<String, ProbeResult>,
    pub service_results: BTreeMap<String, ProbeResult>,
}

/// Up/down counts for one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub total_hosts: usize,
    pub up_hosts: usize,
    pub down_hosts: usize,
    pub total_services: usize,
    pub up_services: usize,
    pub down_services: usize,
}

impl SnapshotSummary {
    pub fn all_up(&self) -> bool {
        self.down_hosts == 0 && self.down_services == 0
    }
}

impl ScanSnapshot {
    pub fn results(&self, kind: TargetKind) -> &BTreeMap<String, ProbeResult> {
        match kind {
            TargetKind::Host => &self.host_results,
            TargetKind::Service => &self.service_results,
        }
    }

    pub fn get(&self, kind: TargetKind, name: &str) -> Option<&ProbeResult> {
        self.results(kind).get(name)
    }

    /// Hosts first, then services, each in name order
    pub fn iter(&self) -> impl Iterator<Item = &ProbeResult> {
        self.host_results.values().chain(self.service_results.values())
    }

    pub fn len(&self) -> usize {
        self.host_results.len() + self.service_results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> SnapshotSummary {
        let up_hosts = self.host_results.values().filter(|r| r.success).count();
        let up_services = self.service_results.values().filter(|r| r.success).count();
        SnapshotSummary {
            total_hosts: self.host_results.len(),
            up_hosts,
            down_hosts: self.host_results.len() - up_hosts,
            total_services: self.service_results.len(),
            up_services,
            down_services: self.service_results.len() - up_services,
        }
    }
}

/// Build a snapshot from one cycle's results.
///
/// Fails only on a duplicate identity within a category, which points at a
/// configuration bug upstream.
pub fn aggregate(
    host_results: Vec<ProbeResult>,
    service_results: Vec<ProbeResult>,
    observed_at: DateTime<Utc>,
) -> crate::Result<ScanSnapshot> {
    Ok(ScanSnapshot {
        observed_at,
        host_results: index_by_name(host_results, TargetKind::Host)?,
        service_results: index_by_name(service_results, TargetKind::Service)?,
    })
}

fn index_by_name(
    results: Vec<ProbeResult>,
    kind: TargetKind,
) -> crate::Result<BTreeMap<String, ProbeResult>> {
    let mut indexed = BTreeMap::new();
    for result in results {
        match indexed.entry(result.target.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(result);
            }
            Entry::Occupied(slot) => {
                return Err(MonitorError::DuplicateTarget {
                    category: kind.as_str(),
                    name: slot.key().clone(),
                });
            }
        }
    }
    Ok(indexed)
}

/// Split a mixed result list (as returned by the prober pool) by target kind
pub fn partition_by_kind(results: Vec<ProbeResult>) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
    results
        .into_iter()
        .partition(|r| r.target.kind() == TargetKind::Host)
}
