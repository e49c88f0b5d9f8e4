//! Backend availability daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │               BACKEND STATUS                 │
//!                     │                                              │
//!   Backend           │  ┌─────────┐    ┌──────────┐    ┌─────────┐  │
//!   /actuator/health ◀┼──│  probe  │◀───│ monitor  │───▶│  watch  │  │
//!                     │  └─────────┘    │ + policy │    │ channel │  │
//!                     │                 └──────────┘    └────┬────┘  │
//!                     │                                      ▼       │
//!   Presentation      │                               ┌───────────┐  │
//!   layers ──────────▶┼──────────────────────────────▶│  /status  │  │
//!                     │                               └───────────┘  │
//!                     │  config (+ hot reload) · logging · metrics   │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use backend_status::config::watcher::ConfigWatcher;
use backend_status::config::validation::validate_config;
use backend_status::config::{load_config, AppConfig, ConfigError};
use backend_status::lifecycle::signals::wait_for_shutdown_signal;
use backend_status::observability::{logging, metrics};
use backend_status::{status, AvailabilityMonitor, HttpProbe, Shutdown};

#[derive(Parser)]
#[command(name = "backend-status")]
#[command(about = "Watches a backend health endpoint and serves its availability", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `monitor.base_url`.
    #[arg(long)]
    base_url: Option<String>,

    /// Reload the monitor policy when the config file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.monitor.base_url = base_url.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("backend-status v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let probe = HttpProbe::new(config.monitor.endpoint()?);
    let policy = config.monitor.policy();
    tracing::info!(
        endpoint = %probe.endpoint(),
        failure_threshold = policy.failure_threshold,
        healthy_interval = ?policy.healthy_interval,
        probe_timeout = ?policy.probe_timeout,
        "Configuration loaded"
    );

    let monitor = AvailabilityMonitor::new(probe, policy);
    monitor.start();

    let shutdown = Shutdown::new();

    let server = if config.status.enabled {
        let listener = TcpListener::bind(&config.status.bind_address).await?;
        let router = status::status_router(monitor.subscribe());
        Some(tokio::spawn(status::serve(listener, router, shutdown.subscribe())))
    } else {
        None
    };

    let mut config_updates = match &cli.config {
        Some(path) if cli.watch => Some(ConfigWatcher::spawn(path, config.clone())?),
        _ => None,
    };

    let signal = wait_for_shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            Some(mut new_config) = async {
                match config_updates.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some(base_url) = &cli.base_url {
                    new_config.monitor.base_url = base_url.clone();
                }
                if new_config.monitor.endpoint().ok() != config.monitor.endpoint().ok() {
                    tracing::warn!("Health endpoint changes take effect after a restart");
                }
                monitor.reconfigure(new_config.monitor.policy());
            }
        }
    }

    monitor.stop();
    shutdown.trigger();
    tracing::debug!(tasks = shutdown.receiver_count(), "Waiting for tasks to drain");
    if let Some(server) = server {
        server.await??;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
