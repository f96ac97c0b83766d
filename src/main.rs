use std::fs::create_dir_all;
use std::fs::OpenOptions;
use std::sync::Arc;

use clap::Parser;
use config::ConfigError;
use deadswitch::gateway;
use deadswitch::Error;
use deadswitch::LoggingConfig;
use deadswitch::Result;
use deadswitch::WatchdogBuilder;
use deadswitch::WatchdogConfig;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const LOG_FILE: &str = "deadswitch.log";

#[derive(Parser, Debug)]
#[command(name = "deadswitch")]
#[command(about = "Dead man's switch watchdog: alerts when periodic jobs stop pinging")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Print the version and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// Configuration file applied on top of defaults, CONFIG_PATH and env
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = WatchdogConfig::new()?;
    if let Some(path) = &cli.config {
        config = config.with_override_config(path)?;
    }
    let config = config.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.logging)?;

    let addr = config.server.socket_addr()?;
    let watchdog = Arc::new(WatchdogBuilder::new(config).build()?);

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    info!(%addr, "watchdog started. Waiting for CTRL+C signal...");
    let served = gateway::serve(watchdog.clone(), addr, graceful_rx).await;

    let report = watchdog.shutdown().await;
    if !report.drained {
        warn!("exiting with undelivered notifications");
    }

    served
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

/// `RUST_LOG` wins over `logging.filter`. Logs go to `<log_dir>/deadswitch.log`
/// when a directory is configured, stdout otherwise.
fn init_observability(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| {
            Error::Config(ConfigError::Message(format!(
                "logging.filter {:?} is invalid: {}",
                config.filter, e
            )))
        })?;

    let Some(log_dir) = &config.log_dir else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .init();
        return Ok(None);
    };

    create_dir_all(log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter);
    tracing_subscriber::registry().with(file_layer).init();

    Ok(Some(guard))
}
