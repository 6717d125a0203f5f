use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use warehouse_api::{
    config, db,
    workers::stock_release::StockReleaseWorker,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    tracing::info!("starting warehouse API server");

    let db_pool = Arc::new(db::establish_connection_from_app_config(&config).await?);
    tracing::info!("database connection established");

    if config.auto_migrate {
        db::run_migrations(&db_pool).await?;
    }

    let state = AppState::new(db_pool, config.clone());

    // Reaper: one long-lived task releasing expired reservations.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = StockReleaseWorker::new(
        state.stock_release_service.clone(),
        config.release_batch_size,
        config.release_interval(),
        shutdown_rx,
    );
    let worker_handle = tokio::spawn(worker.run());

    let app = warehouse_api::api_routes()
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.context_timeout()))
                .layer(CorsLayer::permissive()),
        );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("warehouse API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;
    tracing::info!("warehouse API shutdown complete");

    Ok(())
}

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

    tracing::info!("shutdown signal received");
}
