// crates/hit-dispatch-cli/src/main.rs
// ============================================================================
// Module: Hit Dispatch CLI Entry Point
// Description: Command dispatcher for sending hits and checking configuration.
// Purpose: Provide a scriptable front end over the dispatch engine.
// Dependencies: clap, hit-dispatch-config, hit-dispatch-engine, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `hit-dispatch send <kind>` builds one hit, sends it through a tracker, and
//! suspends the engine so the hit is flushed before exit. Each outcome is
//! printed as one JSON line on stdout. `hit-dispatch config check` loads and
//! validates configuration and prints the effective values.
//! Invariants:
//! - Diagnostics go to stderr; stdout carries only machine-readable output.
//! - The exit code is non-zero unless every hit was sent.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use hit_dispatch_config::CONFIG_ENV_VAR;
use hit_dispatch_config::DEFAULT_CONFIG_NAME;
use hit_dispatch_config::HitDispatchConfig;
use hit_dispatch_core::HitBuilder;
use hit_dispatch_core::HitOutcome;
use hit_dispatch_core::HitParams;
use hit_dispatch_core::Transport;
use hit_dispatch_engine::ChannelObserver;
use hit_dispatch_engine::DispatchEngine;
use hit_dispatch_engine::HttpTransport;
use hit_dispatch_engine::HttpTransportConfig;
use hit_dispatch_engine::StaticPlatformInfo;
use hit_dispatch_engine::TrackerManager;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Capacity of the outcome channel.
const OUTCOME_BUFFER: usize = 64;
/// Log filter used when `--log-level` does not parse.
const FALLBACK_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "hit-dispatch", version, disable_help_subcommand = true)]
struct Cli {
    /// Configuration file (overrides `HIT_DISPATCH_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Log filter directive written to stderr.
    #[arg(long, value_name = "FILTER", default_value = FALLBACK_LOG_FILTER, global = true)]
    log_level: String,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and send one hit.
    Send(SendCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `send`.
#[derive(Args, Debug)]
struct SendCommand {
    /// Property id (overrides `tracker.property_id`).
    #[arg(long, value_name = "ID")]
    property: Option<String>,
    /// Send to the validation endpoint.
    #[arg(long)]
    debug_endpoint: bool,
    /// Hit to send.
    #[command(subcommand)]
    hit: HitCommand,
}

/// Hit kinds accepted by `send`.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum HitCommand {
    /// Screen view.
    Screenview {
        /// Screen name.
        #[arg(long)]
        screen: Option<String>,
    },
    /// Page view.
    Pageview {
        /// Document path.
        #[arg(long)]
        page: Option<String>,
        /// Document title.
        #[arg(long)]
        title: Option<String>,
    },
    /// Custom event.
    Event {
        /// Event category.
        category: String,
        /// Event action.
        action: String,
        /// Event label.
        #[arg(long)]
        label: Option<String>,
        /// Event value.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        value: i64,
    },
    /// Exception report.
    Exception {
        /// Exception description.
        description: String,
        /// Mark the exception as fatal.
        #[arg(long)]
        fatal: bool,
    },
    /// Social interaction.
    Social {
        /// Social network.
        network: String,
        /// Social action.
        action: String,
        /// Action target.
        target: String,
    },
    /// User timing.
    Timing {
        /// Timing category.
        #[arg(long)]
        category: Option<String>,
        /// Timing variable.
        #[arg(long)]
        variable: Option<String>,
        /// Measured time in milliseconds.
        #[arg(long, value_name = "MS")]
        millis: Option<u64>,
        /// Timing label.
        #[arg(long)]
        label: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load, validate, and print the effective configuration.
    Check,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    match cli.command {
        Commands::Send(command) => command_send(cli.config.as_deref(), command).await,
        Commands::Config {
            command: ConfigCommand::Check,
        } => command_config_check(cli.config.as_deref()),
    }
}

/// Installs the stderr log subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

// ============================================================================
// SECTION: Send Command
// ============================================================================

/// Result of sending hits through a short-lived engine.
#[derive(Debug)]
struct SendReport {
    /// Outcomes in delivery order.
    outcomes: Vec<HitOutcome>,
    /// Hits still queued after the final flush.
    left_queued: usize,
}

impl SendReport {
    /// Returns true when every hit was sent.
    fn all_sent(&self) -> bool {
        self.left_queued == 0 && self.outcomes.iter().all(HitOutcome::is_sent)
    }
}

/// Executes the `send` command.
async fn command_send(config_path: Option<&Path>, command: SendCommand) -> CliResult<ExitCode> {
    let mut config = load_config(config_path)?;
    if command.debug_endpoint {
        config.dispatch.debug_endpoint = true;
    }
    let property = command
        .property
        .or_else(|| config.tracker.property_id.clone())
        .ok_or_else(|| {
            CliError::new("no property id: pass --property or set tracker.property_id".to_string())
        })?;
    let transport = HttpTransport::with_config(HttpTransportConfig {
        timeout: config.transport.timeout(),
        connect_timeout: config.transport.connect_timeout(),
    })
    .map_err(|err| CliError::new(format!("transport setup failed: {err}")))?;
    let params = hit_builder(&command.hit).build();
    let report = send_hits(&config, &property, vec![params], Arc::new(transport)).await?;
    for outcome in &report.outcomes {
        let line = serde_json::to_string(outcome)
            .map_err(|err| CliError::new(format!("outcome encoding failed: {err}")))?;
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    if report.left_queued > 0 {
        write_stderr_line(&format!(
            "{} hit(s) left queued: dispatch disabled or throttled",
            report.left_queued
        ))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(if report.all_sent() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Sends `hits` through a tracker for `property` and collects the outcomes.
async fn send_hits(
    config: &HitDispatchConfig,
    property: &str,
    hits: Vec<HitParams>,
    transport: Arc<dyn Transport>,
) -> CliResult<SendReport> {
    let (sender, mut receiver) = mpsc::channel(OUTCOME_BUFFER.max(hits.len()));
    let engine = DispatchEngine::builder()
        .shared_transport(transport)
        .settings(config.dispatch_settings())
        .throttle(config.throttle_settings())
        .observer(ChannelObserver::new(sender))
        .build()
        .map_err(|err| CliError::new(format!("engine setup failed: {err}")))?;
    let platform = config
        .tracker
        .client_id
        .as_deref()
        .map_or_else(StaticPlatformInfo::generated, StaticPlatformInfo::new);
    let manager = TrackerManager::new(engine.clone(), Arc::new(platform));
    let tracker = manager.create_tracker(property);
    tracker.set_app_name(config.tracker.app_name.clone());
    tracker.set_app_version(config.tracker.app_version.clone());
    tracker.set_anonymize_ip(config.tracker.anonymize_ip);
    for params in &hits {
        tracker.send(params);
    }
    engine.suspend().await;
    let left_queued = engine.queue_len();
    drop(manager);
    drop(engine);
    let mut outcomes = Vec::with_capacity(hits.len());
    while let Ok(outcome) = receiver.try_recv() {
        outcomes.push(outcome);
    }
    debug!(outcomes = outcomes.len(), left_queued, "send finished");
    Ok(SendReport {
        outcomes,
        left_queued,
    })
}

/// Maps a hit subcommand onto a builder.
fn hit_builder(command: &HitCommand) -> HitBuilder {
    match command {
        HitCommand::Screenview {
            screen,
        } => HitBuilder::screen_view(screen.as_deref()),
        HitCommand::Pageview {
            page,
            title,
        } => HitBuilder::page_view(page.as_deref(), title.as_deref()),
        HitCommand::Event {
            category,
            action,
            label,
            value,
        } => HitBuilder::custom_event(category, action, label.as_deref(), *value),
        HitCommand::Exception {
            description,
            fatal,
        } => HitBuilder::exception(description, *fatal),
        HitCommand::Social {
            network,
            action,
            target,
        } => HitBuilder::social_interaction(network, action, target),
        HitCommand::Timing {
            category,
            variable,
            millis,
            label,
        } => HitBuilder::timing(
            category.as_deref(),
            variable.as_deref(),
            millis.map(Duration::from_millis),
            label.as_deref(),
        ),
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config check`.
fn command_config_check(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|err| CliError::new(format!("config encoding failed: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads configuration, using defaults when no source exists.
///
/// An explicit path or `HIT_DISPATCH_CONFIG` must point at a readable file;
/// only the implicit default file may be absent.
fn load_config(path: Option<&Path>) -> CliResult<HitDispatchConfig> {
    let implicit = path.is_none() && std::env::var_os(CONFIG_ENV_VAR).is_none();
    if implicit && !Path::new(DEFAULT_CONFIG_NAME).exists() {
        return Ok(HitDispatchConfig::default());
    }
    HitDispatchConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, err: &std::io::Error) -> String {
    format!("failed to write {stream}: {err}")
}

/// Reports an error on stderr and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
