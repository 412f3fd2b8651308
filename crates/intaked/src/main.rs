// # intaked - Registration Intake Daemon
//
// The intaked daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Creating the record store through the store registry
// 4. Running the conversation engine over the line transport
//
// All dialogue, validation and storage logic lives in intake-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Store
// - `INTAKE_STORE_TYPE`: Type of record store (file, memory)
// - `INTAKE_STORE_PATH`: Path to the record sheet (for file store)
//
// ### Engine
// - `INTAKE_SESSION_IDLE_TIMEOUT_SECS`: Evict sessions idle this long (0 = never)
// - `INTAKE_SWEEP_INTERVAL_SECS`: Housekeeping interval
//
// ### Logging
// - `INTAKE_LOG_LEVEL`: trace, debug, info, warn, error
//
// Logs go to stderr; stdin/stdout carry the line-delimited JSON messages.
//
// ## Example
//
// ```bash
// export INTAKE_STORE_TYPE=file
// export INTAKE_STORE_PATH=/var/lib/intake/user_data.json
// export INTAKE_SESSION_IDLE_TIMEOUT_SECS=1800
//
// chat-adapter | intaked
// ```

use anyhow::{Context, Result};
use intake_core::config::{
    EngineConfig, IntakeConfig, MAX_SWEEP_INTERVAL_SECS, StoreConfig, default_store_path,
};
use intake_core::traits::Transport;
use intake_core::{ConversationEngine, StoreRegistry, bot_status};
use std::env;
use std::process::ExitCode;
use tokio::sync::oneshot;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IntakeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IntakeExitCode> for ExitCode {
    fn from(code: IntakeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    store_type: String,
    store_path: String,
    session_idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    log_level: String,
}

/// Read an optional numeric variable
fn env_u64(name: &str) -> Result<Option<u64>> {
    env::var(name)
        .ok()
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds. Got: {}", name, value))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("INTAKE_STORE_TYPE").unwrap_or_else(|_| "file".to_string()),
            store_path: env::var("INTAKE_STORE_PATH").unwrap_or_else(|_| default_store_path()),
            session_idle_timeout_secs: env_u64("INTAKE_SESSION_IDLE_TIMEOUT_SECS")?,
            sweep_interval_secs: env_u64("INTAKE_SWEEP_INTERVAL_SECS")?,
            log_level: env::var("INTAKE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "INTAKE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            if self.store_path.trim().is_empty() {
                anyhow::bail!("INTAKE_STORE_PATH cannot be empty when INTAKE_STORE_TYPE=file");
            }

            if let Some(parent) = std::path::Path::new(&self.store_path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "INTAKE_STORE_PATH parent directory does not exist: {}. \
                    Create it first: mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        if let Some(sweep) = self.sweep_interval_secs
            && !(1..=MAX_SWEEP_INTERVAL_SECS).contains(&sweep)
        {
            anyhow::bail!(
                "INTAKE_SWEEP_INTERVAL_SECS must be between 1 and {} seconds. Got: {}",
                MAX_SWEEP_INTERVAL_SECS,
                sweep
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "INTAKE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.intake_config().validate()?;

        Ok(())
    }

    /// Library configuration for these settings
    fn intake_config(&self) -> IntakeConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.store_path.clone(),
            },
        };

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            session_idle_timeout_secs: self
                .session_idle_timeout_secs
                .unwrap_or(defaults.session_idle_timeout_secs),
            sweep_interval_secs: self
                .sweep_interval_secs
                .unwrap_or(defaults.sweep_interval_secs),
            ..defaults
        };

        IntakeConfig { store, engine }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IntakeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IntakeExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IntakeExitCode::ConfigError.into();
    }

    info!("Starting intaked daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IntakeExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            IntakeExitCode::RuntimeError
        } else {
            IntakeExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let intake = config.intake_config();

    let registry = StoreRegistry::with_builtin_stores();
    let store = registry
        .create_store(&intake.store)
        .context("Failed to create record store")?;
    info!("Record store: {} ({})", intake.store.type_name(), store.descriptor());

    let status = bot_status();
    info!(
        "{} (commands: {}; storage: {})",
        status.message,
        status.commands.join(", "),
        status.storage
    );

    let transport = create_transport()?;
    let (engine, mut events) = ConversationEngine::new(transport, store, intake.engine)?;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signal_task = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(name) => info!("Received shutdown signal: {}", name),
            Err(e) => error!("Shutdown handler error: {:#}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let result = engine.run_with_shutdown(Some(shutdown_rx)).await;

    signal_task.abort();
    drop(engine);
    let _ = event_logger.await;

    result?;
    info!("Daemon stopped");

    Ok(())
}

#[cfg(feature = "stdio")]
fn create_transport() -> Result<Box<dyn Transport>> {
    info!("Using line-delimited JSON transport on stdin/stdout");
    Ok(Box::new(intake_transport_stdio::LineTransport::stdio()))
}

#[cfg(not(feature = "stdio"))]
fn create_transport() -> Result<Box<dyn Transport>> {
    anyhow::bail!("No transport compiled in. Rebuild with --features stdio")
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;

    Ok("SIGINT")
}
