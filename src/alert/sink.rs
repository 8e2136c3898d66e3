//! Alert delivery channels

use crate::alert::Alert;
use crate::config::AlertConfig;
use async_trait::async_trait;
use colored::*;
use std::sync::Arc;

/// Consumer of admitted alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &Alert) -> crate::Result<()>;

    /// Free-form notice (test alerts, summaries)
    async fn notify(&self, message: &str) -> crate::Result<()>;
}

/// Colored terminal output: red for down, green for recovery
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink;

#[async_trait]
impl AlertSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, alert: &Alert) -> crate::Result<()> {
        if alert.kind.is_down() {
            println!("{} {}", "[DOWN]".bright_red().bold(), alert.message.red());
        } else {
            println!("{} {}", "[UP]".bright_green().bold(), alert.message.green());
        }
        Ok(())
    }

    async fn notify(&self, message: &str) -> crate::Result<()> {
        println!("{} {}", "[~]".bright_cyan(), message.bright_cyan());
        Ok(())
    }
}

/// Writes alerts through the `log` facade
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, alert: &Alert) -> crate::Result<()> {
        if alert.kind.is_down() {
            log::error!("ALERT: {}", alert.message);
        } else {
            log::info!("ALERT: {}", alert.message);
        }
        Ok(())
    }

    async fn notify(&self, message: &str) -> crate::Result<()> {
        log::info!("{}", message);
        Ok(())
    }
}

/// Fans alerts out to every configured sink. A failing sink never blocks the others.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Sinks enabled in `[alerts]`; none at all when alerting is off
    pub fn from_config(config: &AlertConfig) -> Self {
        let mut dispatcher = Self::default();
        if !config.enabled {
            return dispatcher;
        }
        if config.console {
            dispatcher = dispatcher.with_sink(Arc::new(ConsoleSink));
        }
        if config.log {
            dispatcher = dispatcher.with_sink(Arc::new(LogSink));
        }
        dispatcher
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn dispatch(&self, alert: &Alert) {
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(alert).await {
                log::error!("Failed to deliver {} alert via {}: {}", alert.kind, sink.name(), e);
            }
        }
    }

    pub async fn notify(&self, message: &str) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(message).await {
                log::error!("Failed to send notice via {}: {}", sink.name(), e);
            }
        }
    }

    /// Verify the channels end to end
    pub async fn send_test_alert(&self) {
        self.notify("TEST ALERT: netwatch alerting is working").await;
    }
}
