//! The scan cycle: probe, aggregate, detect, gate, deliver
//!
//! [`MonitorEngine`] owns all cross-cycle state (the previous snapshot, the
//! alert gate, counters). It is driven serially by one caller, so none of
//! that state needs a lock.

use crate::alert::{Alert, AlertDispatcher, AlertGate, DEFAULT_COOLDOWN};
use crate::config::MonitorConfig;
use crate::history::SnapshotSink;
use crate::network::Target;
use crate::probe::{NetworkProber, Probe, ProbeResult};
use crate::scanner::pool::ProberPool;
use crate::scanner::snapshot::{aggregate, partition_by_kind, ScanSnapshot};
use crate::scanner::transition::{detect, TransitionEvent};
use crate::scanner::{MonitorStats, MonitorStatus};
use crate::MonitorError;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Admitted alerts kept for dashboards
const RECENT_ALERT_LIMIT: usize = 50;

/// Tunables for one engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub per_probe_timeout: Duration,
    pub max_concurrency: usize,
    pub cooldown: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            per_probe_timeout: Duration::from_secs(5),
            max_concurrency: 50,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            per_probe_timeout: config.timeout_duration(),
            max_concurrency: config.monitoring.max_concurrency,
            cooldown: config.cooldown_duration(),
        }
    }
}

/// What one cycle produced
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: Arc<ScanSnapshot>,
    /// Every detected transition, admitted or not
    pub transitions: Vec<TransitionEvent>,
    /// Transitions that passed the gate
    pub alerts: Vec<Alert>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn suppressed(&self) -> usize {
        self.transitions.len() - self.alerts.len()
    }
}

pub struct MonitorEngine {
    targets: Vec<Target>,
    pool: ProberPool,
    settings: EngineSettings,
    gate: AlertGate,
    dispatcher: AlertDispatcher,
    snapshot_sinks: Vec<Arc<dyn SnapshotSink>>,
    previous: Option<Arc<ScanSnapshot>>,
    recent_alerts: VecDeque<Alert>,
    stats: MonitorStats,
    status_tx: watch::Sender<MonitorStatus>,
}

impl MonitorEngine {
    /// Build an engine over a fixed target list.
    ///
    /// Fails when there is nothing to probe or when an identity repeats within
    /// a category.
    pub fn new(
        targets: Vec<Target>,
        probe: Arc<dyn Probe>,
        settings: EngineSettings,
        dispatcher: AlertDispatcher,
    ) -> crate::Result<Self> {
        if targets.is_empty() {
            return Err(MonitorError::NoTargets);
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert((target.kind(), target.name.as_str())) {
                return Err(MonitorError::DuplicateTarget {
                    category: target.kind().as_str(),
                    name: target.name.clone(),
                });
            }
        }

        let (status_tx, _) = watch::channel(MonitorStatus::default());
        Ok(Self {
            targets,
            pool: ProberPool::new(probe),
            gate: AlertGate::new(settings.cooldown),
            settings,
            dispatcher,
            snapshot_sinks: Vec::new(),
            previous: None,
            recent_alerts: VecDeque::with_capacity(RECENT_ALERT_LIMIT),
            stats: MonitorStats::default(),
            status_tx,
        })
    }

    /// Engine over the configuration's enabled targets using real network probes
    pub fn from_config(config: &MonitorConfig, dispatcher: AlertDispatcher) -> crate::Result<Self> {
        config.validate()?;
        let probe: Arc<dyn Probe> = Arc::new(NetworkProber::new(config.probe_options()));
        Self::new(
            config.enabled_targets(),
            probe,
            EngineSettings::from_config(config),
            dispatcher,
        )
    }

    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot_sinks.push(sink);
        self
    }

    /// Publish status on a channel owned by the caller, so subscribers outlive
    /// this engine
    pub fn with_status_channel(mut self, status_tx: watch::Sender<MonitorStatus>) -> Self {
        self.status_tx = status_tx;
        self
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn previous_snapshot(&self) -> Option<&Arc<ScanSnapshot>> {
        self.previous.as_ref()
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn recent_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.recent_alerts.iter()
    }

    /// Live view updated after every cycle
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Account for a cycle that faulted outside the engine's own error path
    pub fn record_fault(&mut self) {
        self.stats.cycle_faults += 1;
        self.publish_status();
    }

    /// Run one cycle stamped with the current time
    pub async fn run_cycle(&mut self) -> crate::Result<CycleReport> {
        self.execute(None).await
    }

    /// Run one cycle stamped with `observed_at`
    pub async fn run_cycle_at(&mut self, observed_at: DateTime<Utc>) -> crate::Result<CycleReport> {
        self.execute(Some(observed_at)).await
    }

    async fn execute(&mut self, observed_at: Option<DateTime<Utc>>) -> crate::Result<CycleReport> {
        let start = Instant::now();
        let results = self
            .pool
            .run_all(
                &self.targets,
                self.settings.per_probe_timeout,
                self.settings.max_concurrency,
            )
            .await;

        for result in &results {
            self.stats.record_probe(result.success);
            log_probe_result(result);
        }

        let observed_at = self.monotonic(observed_at.unwrap_or_else(Utc::now));
        let (hosts, services) = partition_by_kind(results);
        let snapshot = match aggregate(hosts, services, observed_at) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record_fault();
                return Err(e);
            }
        };

        let transitions = detect(self.previous.as_deref(), &snapshot);

        // Admissions land on a staged gate, committed together with the
        // snapshot. A cycle that unwinds mid-dispatch leaves both untouched.
        let mut gate = self.gate.clone();
        let mut alerts = Vec::new();
        let mut suppressed = 0;
        for event in &transitions {
            log_transition(event);
            if gate.admit(event) {
                let alert = Alert::from_event(event);
                self.dispatcher.dispatch(&alert).await;
                alerts.push(alert);
            } else {
                suppressed += 1;
            }
        }

        let snapshot = Arc::new(snapshot);
        self.gate = gate;
        self.previous = Some(snapshot.clone());
        for alert in &alerts {
            self.remember(alert.clone());
        }
        self.stats.alerts_sent += alerts.len() as u64;
        self.stats.alerts_suppressed += suppressed;
        self.stats.cycles += 1;
        self.stats.last_scan = Some(observed_at);

        for sink in &self.snapshot_sinks {
            if let Err(e) = sink.record(&snapshot, &self.stats).await {
                log::error!("Snapshot sink {} failed: {}", sink.name(), e);
            }
        }
        self.publish_status();

        let duration = start.elapsed();
        let summary = snapshot.summary();
        log::info!(
            "Cycle {} done in {:.2}s: hosts {}/{} up, services {}/{} up, {} transition(s), {} alert(s)",
            self.stats.cycles,
            duration.as_secs_f64(),
            summary.up_hosts,
            summary.total_hosts,
            summary.up_services,
            summary.total_services,
            transitions.len(),
            alerts.len()
        );

        Ok(CycleReport {
            snapshot,
            transitions,
            alerts,
            duration,
        })
    }

    /// Snapshot timestamps never go backwards, even if the wall clock does
    fn monotonic(&self, observed_at: DateTime<Utc>) -> DateTime<Utc> {
        match &self.previous {
            Some(previous) if observed_at < previous.observed_at => {
                log::warn!(
                    "Clock moved backwards ({} < {}); reusing previous timestamp",
                    observed_at,
                    previous.observed_at
                );
                previous.observed_at
            }
            _ => observed_at,
        }
    }

    fn remember(&mut self, alert: Alert) {
        if self.recent_alerts.len() == RECENT_ALERT_LIMIT {
            self.recent_alerts.pop_front();
        }
        self.recent_alerts.push_back(alert);
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(MonitorStatus {
            snapshot: self.previous.clone(),
            stats: self.stats.clone(),
            recent_alerts: self.recent_alerts.iter().cloned().collect(),
        });
    }
}

fn log_probe_result(result: &ProbeResult) {
    match (result.success, result.latency_ms()) {
        (true, Some(ms)) => log::debug!("{}: UP - {:.2}ms", result.target, ms),
        (true, None) => log::debug!("{}: UP - no reply (open|filtered)", result.target),
        (false, _) => log::warn!(
            "{}: DOWN - {}",
            result.target,
            result.error.as_deref().unwrap_or("unreachable")
        ),
    }
}

fn log_transition(event: &TransitionEvent) {
    if event.is_recovery() {
        log::info!("{} recovered ({} -> {})", event.target, event.previous_status, event.new_status);
    } else {
        log::error!("{} went down ({} -> {})", event.target, event.previous_status, event.new_status);
    }
}
