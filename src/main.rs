use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kanban_reorder::api::{create_router, AppState};
use kanban_reorder::config::Config;
use kanban_reorder::infrastructure::db;
use kanban_reorder::services::Notifier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,kanban_reorder=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Kanban Reorder v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    config.validate().inspect_err(|e| {
        tracing::error!("Refusing to start: {}", e);
    })?;
    tracing::info!(
        min_gap = config.ranking.min_gap,
        spacing = config.ranking.spacing,
        max_attempts = config.ranking.max_attempts,
        retry_base_delay_ms = config.ranking.retry_base_delay_ms,
        "Rank rebalancing configured"
    );

    let pool = db::init_db(&config.database_url).await?;
    tracing::info!("Database initialized successfully");

    let (events_tx, _rx) = broadcast::channel::<String>(100);
    let notifier = Notifier::new(events_tx);
    let shutdown = CancellationToken::new();

    let config = Arc::new(config);
    let state = AppState::new(pool.clone(), notifier, Arc::clone(&config), shutdown.clone());
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Kanban Reorder listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    pool.close().await;
    tracing::info!("Kanban Reorder shut down gracefully");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    // In-flight moves and rebalances stop at their next checkpoint.
    shutdown.cancel();
}
