//! Bounded-concurrency fan-out of probes across a target list

use crate::network::Target;
use crate::probe::{Probe, ProbeResult};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Slack on top of the per-probe timeout before the pool gives up on a probe
/// that ignores its own deadline
const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// Runs many probes concurrently under a ceiling
#[derive(Clone)]
pub struct ProberPool {
    probe: Arc<dyn Probe>,
}

impl ProberPool {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self { probe }
    }

    /// Probe every target, with at most `max_concurrency` in flight, and wait
    /// for all of them to reach a terminal state.
    ///
    /// Result order is unspecified. An empty target list returns immediately.
    pub async fn run_all(
        &self,
        targets: &[Target],
        per_probe_timeout: Duration,
        max_concurrency: usize,
    ) -> Vec<ProbeResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let (targets, handles): (Vec<Target>, Vec<_>) = targets
            .iter()
            .cloned()
            .map(|target| {
                let semaphore = semaphore.clone();
                let probe = self.probe.clone();
                let handle = tokio::spawn({
                    let target = target.clone();
                    async move {
                        let _permit = match semaphore.acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => return ProbeResult::down(target, "Prober pool closed"),
                        };
                        guarded_probe(probe.as_ref(), target, per_probe_timeout).await
                    }
                });
                (target, handle)
            })
            .unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| match joined {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Probe task for {} failed: {}", target, e);
                    ProbeResult::down(target, format!("Probe task failed: {}", e))
                }
            })
            .collect()
    }
}

/// Enforce the timeout independently of the probe implementation
async fn guarded_probe(probe: &dyn Probe, target: Target, per_probe_timeout: Duration) -> ProbeResult {
    match timeout(per_probe_timeout + TIMEOUT_GRACE, probe.probe(&target, per_probe_timeout)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("{} exceeded its {:?} timeout", target, per_probe_timeout);
            ProbeResult::down(target, format!("Timed out after {:?}", per_probe_timeout))
        }
    }
}
