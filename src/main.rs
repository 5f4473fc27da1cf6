//! Omnibridge - Multi-modal gateway to a TCP inference backend
//!
//! Serves the HTTP API by default; runs a single job when `--mode` is given.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use omnibridge::cli::{self, Cli, Mode};
use omnibridge::{routes, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Cli::parse();
    if let Err(e) = args.validate() {
        e.exit();
    }

    init_tracing();

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    match args.mode {
        None => serve(config).await,
        Some(mode) => {
            let state = AppState::new(config);
            let written = match mode {
                Mode::VoiceMimic => {
                    cli::run_voice_mimic(&args, state.audio.as_ref(), &state.bridge).await?
                }
                Mode::DescribePhoto => {
                    cli::run_describe_photo(&args, state.image.as_ref(), &state.bridge).await?
                }
            };
            info!(files = written.len(), "Job complete");
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "omnibridge=info,tower_http=info".into());

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Omnibridge");

    routes::metrics::init_metrics();
    info!("Metrics initialized");

    let state = Arc::new(AppState::new(config.clone()));
    info!(
        model_service = %config.model_service.addr(),
        timeout_secs = config.model_service.timeout.as_secs_f64(),
        "Application state initialized"
    );

    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Omnibridge shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating shutdown");
        }
    }
}
