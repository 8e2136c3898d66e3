mod common;

use common::{at, PanicOnceSink, RecordingSink, ScriptedProbe};
use futures::FutureExt;
use netwatch::alert::{AlertDispatcher, AlertKind};
use netwatch::network::{Protocol, TargetKind};
use netwatch::scanner::{EngineSettings, MonitorEngine};
use netwatch::{MonitorError, Status, Target};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

fn settings() -> EngineSettings {
    EngineSettings {
        per_probe_timeout: Duration::from_millis(200),
        max_concurrency: 4,
        cooldown: Duration::from_secs(300),
    }
}

fn engine_with(
    targets: Vec<Target>,
    probe: Arc<ScriptedProbe>,
    sink: Arc<RecordingSink>,
) -> MonitorEngine {
    MonitorEngine::new(
        targets,
        probe,
        settings(),
        AlertDispatcher::default().with_sink(sink),
    )
    .unwrap()
}

#[tokio::test]
async fn test_three_cycle_flap_scenario() {
    let probe = Arc::new(ScriptedProbe::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = engine_with(
        vec![Target::host("A", "10.0.0.1"), Target::host("B", "10.0.0.2")],
        probe.clone(),
        sink.clone(),
    );

    // Cycle 1: B unreachable, first observation is silent
    probe.set_up("B", false);
    let first = engine.run_cycle_at(at(0)).await.unwrap();
    assert!(first.transitions.is_empty());
    assert!(first.alerts.is_empty());
    let summary = first.snapshot.summary();
    assert_eq!((summary.up_hosts, summary.down_hosts), (1, 1));

    // Cycle 2: B recovers, one admitted event
    probe.set_up("B", true);
    let second = engine.run_cycle_at(at(30)).await.unwrap();
    assert_eq!(second.transitions.len(), 1);
    assert_eq!(second.alerts.len(), 1);
    let event = &second.transitions[0];
    assert_eq!(event.target.name, "B");
    assert_eq!(event.previous_status, Status::Down);
    assert_eq!(event.new_status, Status::Up);
    assert_eq!(second.alerts[0].kind, AlertKind::HostUp);

    // Cycle 3, 10 s later: B drops again, detected but gated
    probe.set_up("B", false);
    let third = engine.run_cycle_at(at(40)).await.unwrap();
    assert_eq!(third.transitions.len(), 1);
    assert_eq!(third.transitions[0].new_status, Status::Down);
    assert!(third.alerts.is_empty());
    assert_eq!(third.suppressed(), 1);

    assert_eq!(sink.names(), vec!["host_up:B".to_string()]);
    let stats = engine.stats();
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.total_checks, 6);
    assert_eq!(stats.failed_checks, 2);
    assert_eq!(stats.alerts_sent, 1);
    assert_eq!(stats.alerts_suppressed, 1);
}

#[tokio::test]
async fn test_alert_survives_a_cycle_that_unwinds_during_dispatch() {
    let script = Arc::new(ScriptedProbe::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = MonitorEngine::new(
        vec![Target::host("B", "10.0.0.2")],
        script.clone(),
        settings(),
        AlertDispatcher::default()
            .with_sink(Arc::new(PanicOnceSink::default()))
            .with_sink(sink.clone()),
    )
    .unwrap();

    engine.run_cycle_at(at(0)).await.unwrap();

    script.set_up("B", false);
    let faulted = AssertUnwindSafe(engine.run_cycle_at(at(30)))
        .catch_unwind()
        .await;
    assert!(faulted.is_err());
    assert!(sink.alerts.lock().unwrap().is_empty());
    assert_eq!(engine.stats().cycles, 1);
    assert_eq!(engine.previous_snapshot().unwrap().observed_at, at(0));

    // B is still down: the transition is detected again and not gated
    let report = engine.run_cycle_at(at(60)).await.unwrap();
    assert_eq!(report.transitions.len(), 1);
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(sink.names(), vec!["host_down:B".to_string()]);
    assert_eq!(engine.stats().alerts_sent, 1);
    assert_eq!(engine.recent_alerts().count(), 1);
}

#[tokio::test]
async fn test_alert_readmitted_after_cooldown() {
    let probe = Arc::new(ScriptedProbe::default());
    let sink = Arc::new(RecordingSink::default());
    let mut engine = engine_with(
        vec![Target::service("db", "10.0.0.5", 5432, Protocol::Tcp)],
        probe.clone(),
        sink.clone(),
    );

    engine.run_cycle_at(at(0)).await.unwrap();
    probe.set_up("db", false);
    engine.run_cycle_at(at(30)).await.unwrap();
    probe.set_up("db", true);
    engine.run_cycle_at(at(60)).await.unwrap();
    probe.set_up("db", false);
    let late = engine.run_cycle_at(at(400)).await.unwrap();

    assert_eq!(late.alerts.len(), 1);
    assert_eq!(late.alerts[0].kind, AlertKind::ServiceDown);
    assert!(late.alerts[0].message.contains("SERVICE DOWN: db on 10.0.0.5:5432"));
    assert_eq!(
        sink.names(),
        vec!["service_down:db".to_string(), "service_down:db".to_string()]
    );
}

#[tokio::test]
async fn test_all_down_is_a_valid_cycle() {
    let probe = Arc::new(ScriptedProbe::default());
    probe.set_up("x", false);
    probe.set_up("y", false);
    let mut engine = engine_with(
        vec![Target::host("x", "10.0.0.1"), Target::host("y", "10.0.0.2")],
        probe,
        Arc::new(RecordingSink::default()),
    );

    let report = engine.run_cycle_at(at(0)).await.unwrap();
    assert_eq!(report.snapshot.summary().down_hosts, 2);
    assert!(report.snapshot.iter().all(|r| r.latency.is_none()));
}

#[tokio::test]
async fn test_observed_at_never_goes_backwards() {
    let probe = Arc::new(ScriptedProbe::default());
    let mut engine = engine_with(
        vec![Target::host("a", "10.0.0.1")],
        probe,
        Arc::new(RecordingSink::default()),
    );

    engine.run_cycle_at(at(100)).await.unwrap();
    let report = engine.run_cycle_at(at(50)).await.unwrap();
    assert_eq!(report.snapshot.observed_at, at(100));
}

#[tokio::test]
async fn test_status_channel_tracks_cycles() {
    let probe = Arc::new(ScriptedProbe::default());
    let mut engine = engine_with(
        vec![Target::host("a", "10.0.0.1")],
        probe.clone(),
        Arc::new(RecordingSink::default()),
    );
    let status = engine.subscribe();
    assert!(status.borrow().snapshot.is_none());

    engine.run_cycle_at(at(0)).await.unwrap();
    probe.set_up("a", false);
    engine.run_cycle_at(at(30)).await.unwrap();

    let current = status.borrow().clone();
    let snapshot = current.snapshot.expect("published snapshot");
    assert!(!snapshot.get(TargetKind::Host, "a").unwrap().success);
    assert_eq!(current.stats.cycles, 2);
    assert_eq!(current.recent_alerts.len(), 1);
    assert_eq!(engine.recent_alerts().count(), 1);
}

#[test]
fn test_empty_target_set_is_rejected() {
    let result = MonitorEngine::new(
        Vec::new(),
        Arc::new(ScriptedProbe::default()),
        settings(),
        AlertDispatcher::default(),
    );
    assert!(matches!(result, Err(MonitorError::NoTargets)));
}

#[test]
fn test_duplicate_identity_is_rejected() {
    let result = MonitorEngine::new(
        vec![Target::host("a", "10.0.0.1"), Target::host("a", "10.0.0.2")],
        Arc::new(ScriptedProbe::default()),
        settings(),
        AlertDispatcher::default(),
    );
    assert!(matches!(
        result,
        Err(MonitorError::DuplicateTarget { category: "host", .. })
    ));
}

#[test]
fn test_same_name_across_categories_is_allowed() {
    let result = MonitorEngine::new(
        vec![
            Target::host("web", "10.0.0.1"),
            Target::service("web", "10.0.0.1", 443, Protocol::Tcp),
        ],
        Arc::new(ScriptedProbe::default()),
        settings(),
        AlertDispatcher::default(),
    );
    assert!(result.is_ok());
}
