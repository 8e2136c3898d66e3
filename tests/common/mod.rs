//! Scripted probes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use netwatch::alert::AlertSink;
use netwatch::{Alert, Probe, ProbeResult, Target};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reports whatever status the test last set for a target name. Unknown
/// targets are up.
#[derive(Default)]
pub struct ScriptedProbe {
    down: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn set_up(&self, name: &str, up: bool) {
        let mut down = self.down.lock().unwrap();
        if up {
            down.remove(name);
        } else {
            down.insert(name.to_string());
        }
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, target: &Target, _timeout: Duration) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.lock().unwrap().contains(&target.name) {
            ProbeResult::down(target.clone(), "scripted down")
        } else {
            ProbeResult::up(target.clone(), Some(Duration::from_millis(1)))
        }
    }
}

/// Sleeps for a fixed time and records the peak number of concurrent calls
pub struct SlowProbe {
    delay: Duration,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl SlowProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Probe for SlowProbe {
    async fn probe(&self, target: &Target, _timeout: Duration) -> ProbeResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        ProbeResult::up(target.clone(), Some(self.delay))
    }
}

/// Never returns for the named targets, ignoring its timeout
pub struct HangingProbe {
    pub hang: HashSet<String>,
}

#[async_trait]
impl Probe for HangingProbe {
    async fn probe(&self, target: &Target, _timeout: Duration) -> ProbeResult {
        if self.hang.contains(&target.name) {
            std::future::pending::<()>().await;
        }
        ProbeResult::up(target.clone(), Some(Duration::from_millis(1)))
    }
}

/// Keeps every delivered alert
#[derive(Default)]
pub struct RecordingSink {
    pub alerts: Mutex<Vec<Alert>>,
    pub notices: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| format!("{}:{}", a.kind, a.target.name))
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, alert: &Alert) -> netwatch::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn notify(&self, message: &str) -> netwatch::Result<()> {
        self.notices.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Panics on its first delivery, then accepts everything
#[derive(Default)]
pub struct PanicOnceSink {
    fired: AtomicBool,
}

#[async_trait]
impl AlertSink for PanicOnceSink {
    fn name(&self) -> &str {
        "panic-once"
    }

    async fn deliver(&self, _alert: &Alert) -> netwatch::Result<()> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            panic!("sink exploded");
        }
        Ok(())
    }

    async fn notify(&self, _message: &str) -> netwatch::Result<()> {
        Ok(())
    }
}

/// Fixed reference instant so cooldown arithmetic is exact
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::seconds(secs)
}

pub fn host_result(name: &str, up: bool) -> ProbeResult {
    let target = Target::host(name, format!("10.0.0.{}", name.len()));
    if up {
        ProbeResult::up(target, Some(Duration::from_millis(2)))
    } else {
        ProbeResult::down(target, "Request timed out")
    }
}

pub fn statuses(results: &[ProbeResult]) -> HashMap<String, bool> {
    results
        .iter()
        .map(|r| (r.target.name.clone(), r.success))
        .collect()
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
