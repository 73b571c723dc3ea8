mod api;
mod bootstrap;
mod chain;
mod config;
mod error;
mod middleware;
mod monitor;
mod server;
mod status;

use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::Config, status::probe::StatusProbe};

/// How long shutdown waits for an in-flight sweep
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,tower_http=debug,monitor_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();

    if std::env::args().nth(1).as_deref() == Some("probe") {
        return run_probe().await;
    }

    info!("🚀 Starting inheritance monitoring worker");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(kind = ?e.kind(), "❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let state = bootstrap::initialize_app_state(&config).await?;
    let service = state.service.clone();

    // Create HTTP server
    let app = server::create_app(state).await;

    service.start().await;

    // Run the server until SIGINT / SIGTERM
    let served = server::run_server(app, &config.bind_address, shutdown_signal()).await;

    service.shutdown(SHUTDOWN_GRACE).await;
    served?;

    info!("👋 Monitoring worker exited");
    Ok(())
}

/// `monitor-worker probe`: print worker health as JSON, exit 0 if healthy.
async fn run_probe() -> Result<(), Box<dyn std::error::Error>> {
    let (url, status_file, stale_after) = Config::probe_settings()?;
    let report = StatusProbe::new(url, status_file, stale_after).probe().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    std::process::exit(if report.worker_healthy { 0 } else { 1 });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Received SIGINT, shutting down"),
        _ = terminate => info!("🛑 Received SIGTERM, shutting down"),
    }
}
