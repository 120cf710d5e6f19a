// SPDX-License-Identifier: MIT

//! Coverage endpoints: activity-scoped calculation, user-city reads and
//! bulk recalculation with observable progress.

use crate::error::{AppError, Result};
use crate::models::activity::ActivityCoverageRow;
use crate::models::jobs::RecalculationStatus;
use crate::services::coverage::{CoverageResult, UserCityCoverage};
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/coverage/calculate/:activity_id", post(calculate_coverage))
        .route("/api/coverage/recalculate-all", post(recalculate_all))
        .route("/api/coverage/recalculate-status/:job_id", get(recalculation_status))
        .route("/api/coverage/user/:user_id/city/:city_id", get(user_city_coverage))
        .route("/api/coverage/activity/:activity_id", get(activity_coverage))
}

/// Calculate coverage for one activity and persist it.
async fn calculate_coverage(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> Result<Json<CoverageResult>> {
    let result = state.coverage.calculate_activity_coverage(activity_id).await?;
    Ok(Json(result))
}

#[derive(Serialize)]
pub struct RecalculationStartedResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

/// Start an asynchronous recalculation over every attributed activity.
async fn recalculate_all(
    State(state): State<Arc<AppState>>,
) -> Json<RecalculationStartedResponse> {
    let job_id = state.coverage.start_recalculate_all();

    Json(RecalculationStartedResponse {
        job_id,
        status: "started".to_string(),
        message: "Recalculation job started in background".to_string(),
    })
}

/// Snapshot a recalculation job's progress.
async fn recalculation_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<RecalculationStatus>> {
    state
        .coverage
        .recalculation_status(&job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no recalculation job {}", job_id)))
}

/// Aggregate coverage of a user in one city.
async fn user_city_coverage(
    State(state): State<Arc<AppState>>,
    Path((user_id, city_id)): Path<(i32, i32)>,
) -> Result<Json<UserCityCoverage>> {
    let summary = state.coverage.user_city_coverage(user_id, city_id).await?;
    Ok(Json(summary))
}

/// Stored coverage of one activity.
async fn activity_coverage(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<i64>,
) -> Result<Json<ActivityCoverageRow>> {
    let row = state.db.activity_coverage(activity_id).await?;
    Ok(Json(row))
}
