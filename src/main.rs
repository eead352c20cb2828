use std::sync::Arc;

use storefront_orders::api;
use storefront_orders::config::{Config, StoreBackend};
use storefront_orders::error::AppError;
use storefront_orders::notify::log_transport::LogTransport;
use storefront_orders::notify::run_notification_dispatcher;
use storefront_orders::state::AppState;
use storefront_orders::store::file::FileRecordStore;
use storefront_orders::store::memory::MemoryRecordStore;
use storefront_orders::store::RecordStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let backend: Arc<dyn RecordStore> = match &config.store_backend {
        StoreBackend::Memory => Arc::new(MemoryRecordStore::new()),
        StoreBackend::File(root) => {
            tracing::info!(root = %root.display(), "using file record store");
            Arc::new(FileRecordStore::new(root.clone()))
        }
    };

    let shared_state = Arc::new(AppState::new(&config, backend, Arc::new(LogTransport)));

    tokio::spawn(run_notification_dispatcher(
        shared_state.dispatcher.clone(),
        shared_state.engine.subscribe(),
    ));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        platform = %config.platform,
        transition_policy = %config.transition_policy,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
