//! Plan Sync - client-side synchronization cache for visit plans
//!
//! Runs the plan cache as a local daemon in front of the remote plans API.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plan_sync::api::create_router;
use plan_sync::source::HttpPlanSource;
use plan_sync::{spawn_reaper, AppState, Config, PlanSync};

/// Main entry point for the plan sync daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the remote plans client and the shared cache
/// 4. Start the reaper and the plan-created refresh listener
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plan_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Plan Sync");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: stale_window={}s, max_age={}s, reap_interval={}s, port={}, source={}",
        config.stale_window_secs,
        config.max_age_secs,
        config.reap_interval_secs,
        config.server_port,
        config.source_url
    );

    let source = HttpPlanSource::from_config(&config).context("failed to build plans client")?;
    let sync_config = config.sync_config();
    let sync = PlanSync::new(source, sync_config);
    info!("Plan cache initialized");

    let reaper = spawn_reaper(sync.clone(), sync_config.reap_interval);
    let (state, listener) = AppState::with_listener(sync);
    info!("Background tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal(vec![reaper, listener]))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in tasks {
        task.abort();
    }
    warn!("Background tasks aborted");
}
