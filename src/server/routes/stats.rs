//! Aggregate prediction counts

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::inference::Label;
use crate::server::error::Result;
use crate::server::state::SharedState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_predictions: u64,
    pub pneumonia_detected: u64,
    pub normal_detected: u64,
}

/// GET /stats
///
/// The total is the sum of the per-label counts, so it can never disagree
/// with them even while inserts land between the two queries.
pub async fn get_stats(State(state): State<SharedState>) -> Result<Json<StatsResponse>> {
    let store = state.store()?;

    let pneumonia_detected = store.count(Some(Label::Pneumonia)).await?;
    let normal_detected = store.count(Some(Label::Normal)).await?;

    Ok(Json(StatsResponse {
        total_predictions: pneumonia_detected + normal_detected,
        pneumonia_detected,
        normal_detected,
    }))
}
