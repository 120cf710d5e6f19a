// SPDX-License-Identifier: MIT

//! Custom-area endpoints: creation and asynchronous coverage calculation.

use crate::error::Result;
use crate::models::custom_area::CustomArea;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/custom-areas/user/:user_id",
            post(create_custom_area).get(list_custom_areas),
        )
        .route("/api/custom-areas/:id", get(get_custom_area))
        .route(
            "/api/custom-areas/:id/calculate-coverage",
            post(calculate_custom_area_coverage),
        )
}

#[derive(Deserialize)]
pub struct CreateCustomAreaRequest {
    pub name: String,
    /// Vertices as `[lat, lng]` pairs; the ring may be left open.
    pub coordinates: Vec<[f64; 2]>,
}

/// Create a user-drawn area. 400 for fewer than 3 distinct vertices.
async fn create_custom_area(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    Json(request): Json<CreateCustomAreaRequest>,
) -> Result<(StatusCode, Json<CustomArea>)> {
    let area = state
        .custom_areas
        .create(user_id, &request.name, &request.coordinates)
        .await?;

    Ok((StatusCode::CREATED, Json(area)))
}

async fn list_custom_areas(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<CustomArea>>> {
    let areas = state.custom_areas.list_for_user(user_id).await?;
    Ok(Json(areas))
}

async fn get_custom_area(
    State(state): State<Arc<AppState>>,
    Path(area_id): Path<i32>,
) -> Result<Json<CustomArea>> {
    let area = state.custom_areas.get(area_id).await?;
    Ok(Json(area))
}

#[derive(Serialize)]
pub struct CoverageStartedResponse {
    pub message: String,
    pub area: CustomArea,
}

/// Start the weighted-grid coverage calculation in the background and echo
/// the area's current state.
async fn calculate_custom_area_coverage(
    State(state): State<Arc<AppState>>,
    Path(area_id): Path<i32>,
) -> Result<(StatusCode, Json<CoverageStartedResponse>)> {
    let area = state.custom_areas.start_coverage_calculation(area_id).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CoverageStartedResponse {
            message: "Coverage calculation started".to_string(),
            area,
        }),
    ))
}
