// SPDX-License-Identifier: MIT

//! User endpoints: the auth-collaborator entry point, profile reads,
//! pipeline status and the manual discovery trigger.

use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::AuthenticatedUser;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/complete", post(complete_authentication))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/processing-status", get(processing_status))
        .route("/api/users/:id/discover-cities", post(discover_cities))
}

/// Entry point for the OAuth collaborator: persists identity and tokens,
/// then runs the login pipeline in the background.
async fn complete_authentication(
    State(state): State<Arc<AppState>>,
    Json(auth): Json<AuthenticatedUser>,
) -> Result<Json<User>> {
    let user = state.onboarding.complete_authentication(auth).await?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<User>> {
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no user with ID {}", user_id)))?;
    Ok(Json(user))
}

#[derive(Serialize)]
pub struct ProcessingStatusResponse {
    pub user_id: i32,
    pub status: String,
    pub activity_count: i64,
    pub cities_count: i64,
    pub coverage_count: i64,
}

/// Derived pipeline stage from row counts: importing → mapping →
/// calculating → completed.
async fn processing_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ProcessingStatusResponse>> {
    if state.db.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("no user with ID {}", user_id)));
    }

    let (activity_count, cities_count, coverage_count) =
        state.db.processing_counts(user_id).await?;

    let status = if activity_count == 0 {
        "importing_activities"
    } else if cities_count == 0 {
        "mapping_cities"
    } else if coverage_count == 0 {
        "calculating_coverage"
    } else {
        "completed"
    };

    Ok(Json(ProcessingStatusResponse {
        user_id,
        status: status.to_string(),
        activity_count,
        cities_count,
        coverage_count,
    }))
}

#[derive(Serialize)]
pub struct DiscoveryStartedResponse {
    pub user_id: i32,
    pub message: String,
}

/// Manually trigger a resolver pass (materialise, discover, attribute).
async fn discover_cities(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<(StatusCode, Json<DiscoveryStartedResponse>)> {
    if state.db.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("no user with ID {}", user_id)));
    }

    let resolver = state.resolver.clone();
    tokio::spawn(async move {
        if let Err(e) = resolver.resolve_user(user_id).await {
            tracing::error!(user_id, error = %e, "Manual city discovery failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DiscoveryStartedResponse {
            user_id,
            message: "City discovery started".to_string(),
        }),
    ))
}
