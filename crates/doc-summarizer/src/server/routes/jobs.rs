//! Job queue endpoints

use axum::{extract::State, Json};

use crate::error::Result;
use crate::processing::QueueStats;
use crate::server::state::AppState;

/// GET /api/jobs/stats - Queue statistics
pub async fn job_stats(State(state): State<AppState>) -> Result<Json<QueueStats>> {
    Ok(Json(state.job_queue().stats().await?))
}
