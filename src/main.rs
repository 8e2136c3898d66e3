use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use colored::*;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use netwatch::{
    alert::AlertDispatcher,
    config::{ConfigSource, MonitorConfig},
    history::{HistoryStore, SnapshotSink},
    output::{summary_report, OutputConfig, OutputManager},
    scanner::{MonitorEngine, MonitorStatus},
    scheduler::Scheduler,
};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            println!(
                "{} {}",
                "[~] Automatically increasing ulimit value to".bright_blue(),
                limit.to_string().bright_cyan().bold()
            );
        } else {
            eprintln!("{}", "[!] ERROR: Failed to set ulimit value.".bright_red());
        }
    }

    match Resource::NOFILE.get() {
        Ok((soft, _)) => soft,
        Err(_) => {
            eprintln!("{}", "[!] WARNING: Could not get file descriptor limit".bright_yellow());
            65535
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) -> u64 {
    65535
}

fn init_logging(config: &MonitorConfig) -> anyhow::Result<()> {
    let level = config
        .logging
        .level
        .parse::<log::LevelFilter>()
        .unwrap_or_else(|_| {
            eprintln!(
                "{} unknown log level '{}', using info",
                "[!]".bright_yellow(),
                config.logging.level
            );
            log::LevelFilter::Info
        });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp_secs();
    // RUST_LOG wins over the config file
    builder.parse_default_env();

    if let Some(path) = &config.logging.file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn history_sink(config: &MonitorConfig) -> anyhow::Result<Option<Arc<dyn SnapshotSink>>> {
    if !config.history.enabled {
        return Ok(None);
    }
    let path = config.history_path();
    let store = HistoryStore::new(&path, config.history.max_entries)
        .with_context(|| format!("preparing history file {}", path.display()))?;
    Ok(Some(Arc::new(store)))
}

fn build_engine(
    config: &MonitorConfig,
    history: Option<Arc<dyn SnapshotSink>>,
) -> netwatch::Result<MonitorEngine> {
    let engine = MonitorEngine::from_config(config, AlertDispatcher::from_config(&config.alerts))?;
    Ok(match history {
        Some(sink) => engine.with_snapshot_sink(sink),
        None => engine,
    })
}

fn write_sample_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        println!(
            "{} {} already exists, leaving it untouched",
            "[~]".bright_blue(),
            path.display().to_string().bright_cyan()
        );
        return Ok(());
    }
    MonitorConfig::sample()
        .save_toml_file(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "{} Sample configuration written to {}",
        "[✓]".bright_green(),
        path.display().to_string().bright_cyan()
    );
    println!("    Edit the [targets] section, then run with --scan or --monitor.");
    Ok(())
}

fn print_report(status: &MonitorStatus) {
    println!("{}", summary_report(status, chrono::Local::now()));
}

async fn run_single_scan(config: &MonitorConfig, output: &OutputManager) -> anyhow::Result<()> {
    let mut engine = build_engine(config, history_sink(config)?).context("setting up scan")?;
    println!(
        "{} Checking {} target(s)...",
        "[~]".bright_blue(),
        engine.targets().len().to_string().bright_cyan()
    );

    let report = engine.run_cycle().await.context("scan cycle failed")?;
    output.print_snapshot(&report.snapshot);
    print_report(&engine.subscribe().borrow());
    Ok(())
}

async fn run_monitor(config: &MonitorConfig) -> anyhow::Result<()> {
    let history = history_sink(config)?;
    let factory_config = config.clone();
    let mut scheduler = Scheduler::new(config.interval_duration(), move || {
        build_engine(&factory_config, history.clone())
    });

    scheduler.start().context("starting monitor")?;
    println!(
        "{} Monitoring every {}s, press Ctrl-C to stop",
        "[~]".bright_blue(),
        config.monitoring.interval.to_string().bright_cyan()
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    println!("\n{} Stopping after the current cycle...", "[~]".bright_yellow());
    scheduler.stop().await;

    print_report(&scheduler.status());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("netwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Host and service liveness monitor with deduplicated transition alerts")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: ~/.netwatch.toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("scan")
                .short('s')
                .long("scan")
                .help("Run a single check of every target and exit (default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("monitor")
                .short('m')
                .long("monitor")
                .help("Check continuously at the configured interval until Ctrl-C")
                .action(ArgAction::SetTrue)
                .conflicts_with("scan"),
        )
        .arg(
            Arg::new("detailed")
                .long("detailed")
                .help("Show every target in scan output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("setup")
                .long("setup")
                .help("Write a sample configuration file and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-alert")
                .long("test-alert")
                .help("Send a test alert through every enabled channel and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Automatically increase ulimit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned();

    if matches.get_flag("setup") {
        let path = config_path.unwrap_or_else(MonitorConfig::default_path);
        return write_sample_config(&path);
    }

    // The logger is configured from the loaded file, so report the source directly
    let config = match &config_path {
        Some(path) => {
            let config = MonitorConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            println!("{} Loaded config from {}", "[~]".bright_blue(), path.display());
            config
        }
        None => {
            let (config, source) =
                MonitorConfig::load_default_config().context("loading default config")?;
            match source {
                ConfigSource::File(path) => {
                    println!("{} Loaded config from {}", "[~]".bright_blue(), path.display())
                }
                ConfigSource::Defaults(path) => println!(
                    "{} No config at {}; using defaults (create one with --setup)",
                    "[!]".bright_yellow(),
                    path.display()
                ),
            }
            config
        }
    };
    init_logging(&config)?;

    if let Some(ulimit) = matches.get_one::<u64>("ulimit") {
        adjust_ulimit_size(Some(*ulimit));
    }

    if matches.get_flag("test-alert") {
        let dispatcher = AlertDispatcher::from_config(&config.alerts);
        if dispatcher.is_empty() {
            println!("{} No alert channels are enabled", "[!]".bright_yellow());
        } else {
            dispatcher.send_test_alert().await;
        }
        return Ok(());
    }

    if matches.get_flag("monitor") {
        run_monitor(&config).await
    } else {
        let output = OutputManager::new(OutputConfig {
            detailed: matches.get_flag("detailed"),
            ..Default::default()
        });
        run_single_scan(&config, &output).await
    }
}
