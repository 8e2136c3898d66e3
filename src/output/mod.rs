//! Output formatting for scan results and summary reports

use crate::network::TargetKind;
use crate::probe::ProbeResult;
use crate::scanner::{MonitorStats, MonitorStatus, ScanSnapshot, SnapshotSummary};
use chrono::{DateTime, Local};
use colored::*;
use std::fmt::Write;

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub colored: bool,
    /// Include every target, not just the overview
    pub detailed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colored: true,
            detailed: false,
        }
    }
}

pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn print_snapshot(&self, snapshot: &ScanSnapshot) {
        print!("{}", self.format_snapshot(snapshot));
    }

    /// Overview line per category, plus one row per target when detailed
    pub fn format_snapshot(&self, snapshot: &ScanSnapshot) -> String {
        let summary = snapshot.summary();
        let mut output = String::new();

        output.push('\n');
        output.push_str(&self.format_overview(&summary));

        if self.config.detailed {
            for (kind, title) in [(TargetKind::Host, "HOSTS"), (TargetKind::Service, "SERVICES")] {
                let results = snapshot.results(kind);
                if results.is_empty() {
                    continue;
                }
                output.push('\n');
                output.push_str(&self.paint(&format!("{}:\n", title), Paint::Header));
                for result in results.values() {
                    output.push_str(&self.format_row(result));
                }
            }
        }
        output.push('\n');
        output
    }

    fn format_overview(&self, summary: &SnapshotSummary) -> String {
        let hosts = format!(
            "Hosts:    {}/{} up ({} down)\n",
            summary.up_hosts, summary.total_hosts, summary.down_hosts
        );
        let services = format!(
            "Services: {}/{} up ({} down)\n",
            summary.up_services, summary.total_services, summary.down_services
        );
        let paint = if summary.all_up() { Paint::Up } else { Paint::Down };
        format!("{}{}", self.paint(&hosts, paint), self.paint(&services, paint))
    }

    fn format_row(&self, result: &ProbeResult) -> String {
        let latency = match result.latency_ms() {
            Some(ms) => format!("{:.2}ms", ms),
            None if result.success => "no reply".to_string(),
            None => "-".to_string(),
        };
        let mut line = format!(
            "  {:<6} {:<24} {:<28} {:>10}",
            result.status().to_string().to_uppercase(),
            result.target.name,
            result.target.endpoint(),
            latency
        );
        if let Some(error) = &result.error {
            let _ = write!(line, "  {}", error);
        }
        line.push('\n');

        let paint = if result.success { Paint::Up } else { Paint::Down };
        self.paint(&line, paint)
    }

    fn paint(&self, text: &str, paint: Paint) -> String {
        if !self.config.colored {
            return text.to_string();
        }
        match paint {
            Paint::Up => text.bright_green().to_string(),
            Paint::Down => text.bright_red().to_string(),
            Paint::Header => text.bright_cyan().bold().to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Paint {
    Up,
    Down,
    Header,
}

/// Plain-text summary report over the latest status
pub fn summary_report(status: &MonitorStatus, generated_at: DateTime<Local>) -> String {
    let summary = status
        .snapshot
        .as_ref()
        .map(|s| s.summary())
        .unwrap_or_default();
    let stats: &MonitorStats = &status.stats;

    format!(
        "\nNetwork Monitor Summary Report\n\
         Generated: {}\n\
         \n\
         HOST STATUS:\n\
         - Total Hosts: {}\n\
         - Online: {}\n\
         - Offline: {}\n\
         \n\
         SERVICE STATUS:\n\
         - Total Services: {}\n\
         - Running: {}\n\
         - Stopped: {}\n\
         \n\
         MONITORING STATS:\n\
         - Total Checks: {}\n\
         - Successful: {}\n\
         - Failed: {}\n\
         - Success Rate: {:.1}%\n\
         \n\
         RECENT ALERTS: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S"),
        summary.total_hosts,
        summary.up_hosts,
        summary.down_hosts,
        summary.total_services,
        summary.up_services,
        summary.down_services,
        stats.total_checks,
        stats.successful_checks,
        stats.failed_checks,
        stats.success_rate(),
        status.recent_alerts.len()
    )
}
