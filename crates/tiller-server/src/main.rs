//! tillerd - behavior engine daemon.

use tiller_core::EngineConfig;
use tiller_server::{run_feed, Engine};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// `TILLER_CONFIG` names a config file; environment overrides apply on top.
fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match std::env::var("TILLER_CONFIG") {
        Ok(path) => {
            let mut config = EngineConfig::from_file(&path)?;
            config.apply_env();
            config
        }
        Err(_) => EngineConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("tiller=debug".parse()?),
        )
        .init();

    let config = load_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        behaviors = %config.behaviors_path.display(),
        workers = config.worker_threads,
        "Starting tillerd"
    );

    let mut engine = Engine::new(config);
    let report = engine.start().await?;
    for (name, e) in &report.failures {
        error!(task = %name, code = e.code().as_str(), error = %e, "Task not loaded");
        if let Some(hint) = e.suggestion() {
            info!(task = %name, "{}", hint);
        }
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping engine...");
        }
        result = run_feed(&engine, stdin) => {
            match result {
                Ok(summary) => info!(
                    applied = summary.applied,
                    rejected = summary.rejected,
                    "Command feed closed"
                ),
                Err(e) => error!(error = %e, "Command feed failed"),
            }
            shutdown_signal().await;
            info!("Shutdown signal received, stopping engine...");
        }
    }

    engine.shutdown().await?;
    info!("tillerd stopped cleanly");
    Ok(())
}
