//! Health check endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::server::state::SharedState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub model_loaded: bool,
    pub database_connected: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET / and GET /health - always 200, reports degraded components
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_string(),
        message: "Pneumonia Detection API is running".to_string(),
        model_loaded: state.model_loaded(),
        database_connected: state.database_connected(),
        version: crate::VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}
