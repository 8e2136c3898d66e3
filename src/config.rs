//! Configuration module for the netwatch monitor

use crate::alert::DEFAULT_COOLDOWN;
use crate::network::icmp::IcmpMode;
use crate::network::{Protocol, Target};
use crate::probe::ProbeOptions;
use crate::MonitorError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure, loaded once and treated as immutable per cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub monitoring: MonitoringConfig,
    pub targets: TargetsConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
    pub history: HistoryConfig,
}

/// Scan cadence and probe behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Seconds between cycle starts
    pub interval: u64,

    /// Per-probe timeout in seconds
    pub timeout: u64,

    /// Maximum probes in flight at once
    pub max_concurrency: usize,

    /// Attempts per probe within its timeout
    pub max_retries: u32,

    pub icmp_mode: IcmpMode,

    /// Count a UDP port that stays silent until the timeout as up
    pub udp_silence_is_up: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: 30,
            timeout: 5,
            max_concurrency: 50,
            max_retries: 1,
            icmp_mode: IcmpMode::Auto,
            udp_silence_is_up: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    pub hosts: Vec<HostEntry>,
    pub services: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    pub name: String,
    #[serde(alias = "ip")]
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub console: bool,
    pub log: bool,
    /// Seconds before the same (kind, target) alert may fire again
    pub cooldown: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            console: true,
            log: true,
            cooldown: DEFAULT_COOLDOWN.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Status history file kept for dashboards and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Defaults to `~/.netwatch/status_history.json`
    pub path: Option<PathBuf>,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            max_entries: 1000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// Nothing at this path; built-in defaults were used
    Defaults(PathBuf),
}

impl MonitorConfig {
    /// Starter configuration written by `--setup`
    pub fn sample() -> Self {
        Self {
            targets: TargetsConfig {
                hosts: vec![
                    HostEntry {
                        name: "localhost".to_string(),
                        address: "127.0.0.1".to_string(),
                        enabled: true,
                    },
                    HostEntry {
                        name: "cloudflare-dns".to_string(),
                        address: "1.1.1.1".to_string(),
                        enabled: true,
                    },
                ],
                services: vec![
                    ServiceEntry {
                        name: "local-ssh".to_string(),
                        host: "127.0.0.1".to_string(),
                        port: 22,
                        protocol: Protocol::Tcp,
                        enabled: true,
                    },
                    ServiceEntry {
                        name: "cloudflare-dns-udp".to_string(),
                        host: "1.1.1.1".to_string(),
                        port: 53,
                        protocol: Protocol::Udp,
                        enabled: true,
                    },
                ],
            },
            ..Default::default()
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MonitorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_toml_file<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MonitorError::Config(format!("Config serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `~/.netwatch.toml`, or `./netwatch.toml` without a home directory
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".netwatch.toml"))
            .unwrap_or_else(|| PathBuf::from("netwatch.toml"))
    }

    /// Load from the default location, falling back to built-in defaults
    pub fn load_default_config() -> crate::Result<(Self, ConfigSource)> {
        Self::load_or_default(Self::default_path())
    }

    /// Load `path` if it exists, otherwise use built-in defaults.
    ///
    /// Runs before logging is configured, so the caller reports the source.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> crate::Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::from_toml_file(path)?;
            Ok((config, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())))
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let monitoring = &self.monitoring;
        if monitoring.interval == 0 {
            return Err(MonitorError::Config("interval must be greater than 0".to_string()));
        }
        if monitoring.timeout == 0 {
            return Err(MonitorError::Config("timeout must be greater than 0".to_string()));
        }
        if monitoring.max_concurrency == 0 {
            return Err(MonitorError::Config(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if monitoring.max_retries == 0 {
            return Err(MonitorError::Config("max_retries must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for host in &self.targets.hosts {
            if host.name.trim().is_empty() || host.address.trim().is_empty() {
                return Err(MonitorError::Config("host needs a name and an address".to_string()));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(MonitorError::DuplicateTarget {
                    category: "host",
                    name: host.name.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for service in &self.targets.services {
            if service.name.trim().is_empty() || service.host.trim().is_empty() {
                return Err(MonitorError::Config("service needs a name and a host".to_string()));
            }
            if service.port == 0 {
                return Err(MonitorError::Config(format!("service {} has port 0", service.name)));
            }
            if !service.protocol.uses_port() {
                return Err(MonitorError::Config(format!(
                    "service {} must use tcp or udp",
                    service.name
                )));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(MonitorError::DuplicateTarget {
                    category: "service",
                    name: service.name.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn host_targets(&self) -> Vec<Target> {
        self.targets
            .hosts
            .iter()
            .filter(|h| h.enabled)
            .map(|h| Target::host(&h.name, &h.address))
            .collect()
    }

    pub fn service_targets(&self) -> Vec<Target> {
        self.targets
            .services
            .iter()
            .filter(|s| s.enabled)
            .map(|s| Target::service(&s.name, &s.host, s.port, s.protocol))
            .collect()
    }

    /// Every enabled target, hosts first
    pub fn enabled_targets(&self) -> Vec<Target> {
        let mut targets = self.host_targets();
        targets.extend(self.service_targets());
        targets
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.monitoring.timeout)
    }

    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_secs(self.alerts.cooldown)
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            icmp_mode: self.monitoring.icmp_mode,
            max_retries: self.monitoring.max_retries,
            udp_silence_is_up: self.monitoring.udp_silence_is_up,
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.history.path.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".netwatch")
                .join("status_history.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let (config, source) = MonitorConfig::load_or_default(&path).unwrap();
        assert_eq!(source, ConfigSource::Defaults(path));
        assert_eq!(config.monitoring.interval, MonitorConfig::default().monitoring.interval);
    }

    #[test]
    fn test_existing_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netwatch.toml");
        MonitorConfig::sample().save_toml_file(&path).unwrap();

        let (config, source) = MonitorConfig::load_or_default(&path).unwrap();
        assert_eq!(source, ConfigSource::File(path));
        assert!(!config.targets.hosts.is_empty());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
        assert!(MonitorConfig::sample().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [monitoring]
            interval = 60

            [[targets.hosts]]
            name = "gw"
            ip = "10.0.0.1"

            [[targets.services]]
            name = "dns"
            host = "10.0.0.1"
            port = 53
            protocol = "udp"
            "#,
        )
        .unwrap();

        assert_eq!(config.monitoring.interval, 60);
        assert_eq!(config.monitoring.timeout, 5);
        assert_eq!(config.monitoring.max_concurrency, 50);
        assert_eq!(config.alerts.cooldown, 300);
        assert_eq!(config.targets.hosts[0].address, "10.0.0.1");
        assert!(config.targets.hosts[0].enabled);
        assert_eq!(config.targets.services[0].protocol, Protocol::Udp);
    }

    #[test]
    fn test_disabled_targets_are_skipped() {
        let mut config = MonitorConfig::sample();
        config.targets.hosts[0].enabled = false;
        let names: Vec<_> = config.enabled_targets().into_iter().map(|t| t.name).collect();
        assert!(!names.contains(&"localhost".to_string()));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_duplicate_service_names_rejected() {
        let mut config = MonitorConfig::sample();
        let duplicate = config.targets.services[0].clone();
        config.targets.services.push(duplicate);
        assert!(matches!(
            config.validate(),
            Err(MonitorError::DuplicateTarget { category: "service", .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = MonitorConfig::default();
        config.monitoring.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_icmp_service_rejected() {
        let mut config = MonitorConfig::sample();
        config.targets.services[0].protocol = Protocol::Icmp;
        assert!(config.validate().is_err());
    }
}
