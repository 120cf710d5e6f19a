// SPDX-License-Identifier: MIT

//! Comment endpoints: trigger the delta notifier and manage settings.

use crate::error::Result;
use crate::models::settings::CommentSettings;
use crate::services::comments::CommentRunSummary;
use crate::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/comments/process/user/:user_id", post(process_comments))
        .route(
            "/api/comments/settings/user/:user_id",
            get(get_settings).put(update_settings),
        )
}

#[derive(Serialize)]
pub struct ProcessCommentsResponse {
    pub user_id: i32,
    pub message: String,
    #[serde(flatten)]
    pub summary: CommentRunSummary,
}

/// Run the delta notifier for a user's pending activities.
async fn process_comments(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ProcessCommentsResponse>> {
    let summary = state.comments.process_pending(user_id).await?;

    Ok(Json(ProcessCommentsResponse {
        user_id,
        message: format!("Posted {} comments", summary.posted),
        summary,
    }))
}

/// Fetch the user's comment settings (defaults when none stored).
async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<CommentSettings>> {
    let settings = state.db.get_comment_settings(user_id).await?;
    Ok(Json(settings))
}

/// Replace the user's comment settings.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    Json(mut settings): Json<CommentSettings>,
) -> Result<Json<CommentSettings>> {
    settings.user_id = user_id;
    state.db.upsert_comment_settings(&settings).await?;
    Ok(Json(settings))
}
