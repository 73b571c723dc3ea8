use std::future::Future;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    api::handler::{
        get_contract, get_status, not_found, start_monitoring, stop_monitoring, AppState,
    },
    middleware::create_cors_layer,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Health endpoints, same body
        .route("/status", get(get_status))
        .route("/health", get(get_status))
        // Process control
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
        // Read-only contract lookup
        .route("/contracts/:address", get(get_contract))
        .fallback(not_found)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(
    app: Router,
    bind_address: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Status server listening on: {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("🌐 Status server shut down");
    Ok(())
}
