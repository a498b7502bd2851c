//! Recent prediction history

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::server::error::{Result, ServerError};
use crate::server::state::SharedState;
use crate::storage::PredictionRecord;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<PredictionRecord>,
    pub count: usize,
}

/// Parse `?limit=`, clamped to `1..=MAX_HISTORY_LIMIT`
pub fn parse_limit(raw: Option<&str>) -> Result<usize> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_HISTORY_LIMIT);
    };
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ServerError::Validation(format!("Invalid limit: {}", raw)))?;
    Ok(limit.clamp(1, MAX_HISTORY_LIMIT as i64) as usize)
}

/// GET /history?limit=N - newest first
pub async fn get_history(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<HistoryResponse>> {
    let limit = parse_limit(params.get("limit").map(String::as_str))?;
    let store = state.store()?;

    let history = store.query_recent(limit).await?;
    Ok(Json(HistoryResponse {
        count: history.len(),
        history,
    }))
}
