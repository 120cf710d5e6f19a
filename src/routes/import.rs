// SPDX-License-Identifier: MIT

//! Import control endpoints: start a backfill, read its progress.

use crate::error::{AppError, Result};
use crate::models::jobs::ImportStatus;
use crate::services::ImportMode;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/import/initial/:user_id", post(start_initial_import))
        .route("/api/import/status/:user_id", get(import_status))
}

#[derive(Serialize)]
pub struct ImportStartedResponse {
    pub user_id: i32,
    pub message: String,
}

/// Start a full-history stream-mode import in the background. 409 when an
/// import is already running for this user.
async fn start_initial_import(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<(StatusCode, Json<ImportStartedResponse>)> {
    state.importer.start(user_id, ImportMode::Stream).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ImportStartedResponse {
            user_id,
            message: "Initial import started; poll /api/import/status for progress".to_string(),
        }),
    ))
}

/// Read the persisted import-job row.
async fn import_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ImportStatus>> {
    let status = state
        .db
        .get_import_status(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no import status for user {}", user_id)))?;

    Ok(Json(status))
}
