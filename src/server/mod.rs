//! HTTP service
//!
//! Axum router exposing health, predict, history and stats endpoints over a
//! shared [`AppState`].

pub mod error;
pub mod routes;
pub mod state;

pub use error::ServerError;
pub use state::{AppState, SharedState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServiceConfig;

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
}

/// Only a matching request origin is echoed back; other origins get no
/// `Access-Control-Allow-Origin` header at all
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let origin = match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::list([origin]),
        Some(Err(_)) => {
            warn!(frontend_url = ?frontend_url, "FRONTEND_URL is not a valid origin, allowing any");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(state.config.frontend_url.as_deref());
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(routes::health::health_check))
        .route("/health", get(routes::health::health_check))
        .route("/predict", post(routes::predict::predict))
        .route("/history", get(routes::history::get_history))
        .route("/stats", get(routes::stats::get_stats))
        .fallback(handle_404)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server with the given configuration
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    let addr: SocketAddr = config.bind_address().parse()?;

    info!(
        model_path = %config.model_path.display(),
        store = %config.store,
        upload_dir = ?config.upload_dir,
        frontend_url = ?config.frontend_url,
        max_upload_size_mb = config.max_upload_bytes / 1024 / 1024,
        "Initializing service"
    );

    let state = Arc::new(AppState::initialize(config).await);
    info!(
        model_loaded = state.model_loaded(),
        database_connected = state.database_connected(),
        "Service state ready"
    );
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(uptime_secs = uptime.num_seconds(), "Shutdown signal received, stopping server gracefully");
    };

    info!(url = %format!("http://{}", addr), "Pneumonia Detection API started (press ctrl+c to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
