//! Single-target reachability probes
//!
//! A probe never fails past its boundary: timeouts, refusals and DNS errors
//! all come back as a [`ProbeResult`] with `success == false`, so one dead
//! target cannot abort a scan cycle.

use crate::network::icmp::{IcmpMode, Pinger};
use crate::network::socket::{TcpConnector, UdpOutcome, UdpProber};
use crate::network::{Protocol, Target};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Observed up/down status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

impl Status {
    pub fn from_success(success: bool) -> Self {
        if success {
            Status::Up
        } else {
            Status::Down
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Status::Up)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Up => f.write_str("up"),
            Status::Down => f.write_str("down"),
        }
    }
}

/// Outcome of one probe attempt against one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: Target,
    pub success: bool,
    /// Absent for failures, so "down" never looks like "instantaneous"
    pub latency: Option<Duration>,
    pub error: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn up(target: Target, latency: Option<Duration>) -> Self {
        Self {
            target,
            success: true,
            latency,
            error: None,
            observed_at: Utc::now(),
        }
    }

    pub fn down(target: Target, reason: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            latency: None,
            error: Some(reason.into()),
            observed_at: Utc::now(),
        }
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    pub fn status(&self) -> Status {
        Status::from_success(self.success)
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(|l| l.as_secs_f64() * 1000.0)
    }
}

/// A reachability test against a single target, bounded by `timeout`
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeResult;
}

/// Probe options taken from the monitoring configuration
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub icmp_mode: IcmpMode,
    /// Attempts per probe, all within the one timeout budget
    pub max_retries: u32,
    /// Treat a silent UDP port as up (open|filtered)
    pub udp_silence_is_up: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            icmp_mode: IcmpMode::Auto,
            max_retries: 1,
            udp_silence_is_up: true,
        }
    }
}

/// The production probe: ICMP for hosts, TCP connect or UDP exchange for services
#[derive(Debug)]
pub struct NetworkProber {
    pinger: Pinger,
    options: ProbeOptions,
}

impl NetworkProber {
    pub fn new(options: ProbeOptions) -> Self {
        Self {
            pinger: Pinger::new(options.icmp_mode),
            options,
        }
    }

    async fn attempt(&self, target: &Target, budget: Duration) -> crate::Result<Option<Duration>> {
        match target.protocol {
            Protocol::Icmp => self.pinger.ping(&target.address, budget).await.map(Some),
            Protocol::Tcp => {
                let port = required_port(target)?;
                TcpConnector::new(budget)
                    .connect(&target.address, port)
                    .await
                    .map(Some)
            }
            Protocol::Udp => {
                let port = required_port(target)?;
                match UdpProber::new(budget).probe(&target.address, port).await? {
                    UdpOutcome::Reply(latency) => Ok(Some(latency)),
                    UdpOutcome::Silent if self.options.udp_silence_is_up => Ok(None),
                    UdpOutcome::Silent => Err(crate::MonitorError::Timeout(budget)),
                }
            }
        }
    }
}

fn required_port(target: &Target) -> crate::Result<u16> {
    target
        .port
        .ok_or_else(|| crate::MonitorError::Config(format!("{} has no port", target.name)))
}

#[async_trait]
impl Probe for NetworkProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> ProbeResult {
        let start = Instant::now();
        let attempts = self.options.max_retries.max(1);
        let mut last_error = String::from("not attempted");

        for attempt in 1..=attempts {
            let budget = timeout.saturating_sub(start.elapsed());
            if budget.is_zero() {
                break;
            }

            match self.attempt(target, budget).await {
                Ok(latency) => {
                    log::debug!("{} up (attempt {}/{})", target, attempt, attempts);
                    return ProbeResult::up(target.clone(), latency);
                }
                Err(e) => {
                    log::debug!("{} attempt {}/{} failed: {}", target, attempt, attempts, e);
                    last_error = e.to_string();
                    // Configuration problems do not improve with retries
                    if e.is_config_defect() {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(RETRY_PAUSE.min(timeout.saturating_sub(start.elapsed())))
                            .await;
                    }
                }
            }
        }

        ProbeResult::down(target.clone(), last_error)
    }
}
