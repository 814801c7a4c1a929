// # dynrd - Dyndns2 Update Endpoint Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add DNS, credential, or retry logic here
// - All request handling lives in dynr-core
// - Configuration is via environment variables ONLY (see `dynrd::config`)
//
// The dynrd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering and creating record/secret stores
// 4. Serving the HTTP endpoint until SIGTERM/SIGINT
//
// ## Example
//
// ```bash
// export DYNR_ALLOWED_ZONES='{"example.com":{"allowed_records":["vpn"]}}'
// export DYNR_CLOUDFLARE_API_TOKEN=your_token
// export DYNR_USERS_ADMIN='{"username":"admin","password":"s3cret"}'
//
// dynrd
// ```

use anyhow::{Context, Result, anyhow};
use dynrd::DaemonConfig;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time allowed for in-flight requests after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DynrExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DynrExitCode> for ExitCode {
    fn from(code: DynrExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Failure of `run_daemon`, split by exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DynrExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DynrExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return DynrExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DynrExitCode::ConfigError.into();
    }

    info!("Starting dynrd daemon");
    info!(
        "Configuration loaded: {} zone(s), record store {}, secret store {}",
        config.dynr.allowed_zones.len(),
        config.dynr.record_store.type_name(),
        config.dynr.secret_store.type_name()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DynrExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DynrExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                DynrExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                DynrExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: DaemonConfig) -> Result<(), DaemonError> {
    let registry = dynrd::store_registry();
    let handler = dynrd::build_handler(&config.dynr, &registry)
        .await
        .map_err(DaemonError::Startup)?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))
        .map_err(DaemonError::Startup)?;

    let app = dynrd::router(handler, &config.http);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(dynrd::serve(listener, app, async move {
        let _ = stop_rx.await;
    }));

    info!("Daemon initialized successfully");

    tokio::select! {
        joined = &mut server => {
            return flatten(joined).map_err(DaemonError::Runtime);
        }
        signal = wait_for_shutdown() => {
            let signal = signal.map_err(DaemonError::Runtime)?;
            info!("Received shutdown signal: {}", signal);
        }
    }

    info!("Shutting down daemon, draining in-flight requests");
    let _ = stop_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server).await {
        Ok(joined) => flatten(joined).map_err(DaemonError::Runtime),
        Err(_) => Err(DaemonError::Runtime(anyhow!(
            "Shutdown timeout after {:?}",
            DRAIN_TIMEOUT
        ))),
    }
}

fn flatten(joined: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| anyhow!("Server task failed: {}", e))?
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
