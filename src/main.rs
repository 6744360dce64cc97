//! hostwatch binary: CLI parsing, logging setup, and signal wiring.

use std::time::Duration;

use clap::Parser;
use hostwatch::{
    MonitorConfig, ProcfsSourceFactory, ShutdownHandle, Supervisor, DEFAULT_DISPLAY_INTERVAL_SECS,
    DEFAULT_LOG_FILE,
};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "hostwatch")]
#[command(about = "Live CPU, memory, disk, and process-count monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Display refresh interval in seconds (collection stays at 1s)
    #[arg(long, default_value_t = DEFAULT_DISPLAY_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Append each displayed snapshot to the log file
    #[arg(long)]
    log: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = MonitorConfig::default()
        .with_display_interval(Duration::from_secs(cli.interval))
        .with_log(cli.log)
        .with_log_path(DEFAULT_LOG_FILE);

    let mut supervisor = Supervisor::new(config);
    spawn_signal_task(supervisor.shutdown_handle());

    supervisor.start(&ProcfsSourceFactory).await?;
    println!("Host monitor started. Press Ctrl+C to exit.");
    println!("Updating every {} seconds...", cli.interval);
    if cli.log {
        println!("Logging snapshots to {DEFAULT_LOG_FILE}");
    }

    supervisor.run().await;
    println!("\nShutting down...");
    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Forward SIGINT/SIGTERM to the supervisor's cancellation flag.
fn spawn_signal_task(handle: ShutdownHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("shutdown signal received");
        handle.request();
    });
}
