// SPDX-License-Identifier: MIT

//! HTTP surface tests: routing, status codes and the JSON error envelope.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use coverage_tracker::config::Config;
use coverage_tracker::routes::create_router;
use coverage_tracker::services::{
    CommentService, CoverageService, CustomAreaService, Geocoder, ImportService,
    OnboardingService, RegionResolver, StravaClient,
};
use coverage_tracker::AppState;
use std::sync::Arc;
use tower::util::ServiceExt;

async fn test_state() -> Arc<AppState> {
    let db = test_db().await;
    let strava = StravaClient::new("id".to_string(), "secret".to_string())
        .with_base_url("http://127.0.0.1:1");
    let geocoder = Geocoder::new().with_base_url("http://127.0.0.1:1");

    let importer = ImportService::new(db.clone(), strava.clone());
    let resolver = RegionResolver::new(db.clone(), geocoder);
    let coverage = CoverageService::new(db.clone());
    let custom_areas = CustomAreaService::new(db.clone());
    let comments = CommentService::new(db.clone(), strava.clone());
    let onboarding = OnboardingService::new(
        db.clone(),
        strava.clone(),
        importer.clone(),
        resolver.clone(),
        coverage.clone(),
    );

    Arc::new(AppState {
        config: Config::default(),
        db,
        strava,
        importer,
        resolver,
        coverage,
        custom_areas,
        comments,
        onboarding,
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    require_database!();
    let app = create_router(test_state().await);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_import_status_returns_error_envelope() {
    require_database!();
    let app = create_router(test_state().await);

    let response = app
        .oneshot(
            Request::get("/api/import/status/999999999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], 404);
    assert_eq!(json["message"], "Not found");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_comment_settings_default_over_http() {
    require_database!();
    let state = test_state().await;
    let user = create_user(&state.db).await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::get(format!("/api/comments/settings/user/{}", user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["enabled"], false);
    assert_eq!(json["min_coverage_increase"], 0.1);
}

#[tokio::test]
async fn test_create_custom_area_validation_error() {
    require_database!();
    let state = test_state().await;
    let user = create_user(&state.db).await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::post(format!("/api/custom-areas/user/{}", user.id))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "name": "Too Small",
                        "coordinates": [[52.0, -1.0], [52.01, -1.0]]
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], 400);
    assert!(json["details"]
        .as_str()
        .unwrap()
        .contains("at least 3 distinct vertices"));
}

#[tokio::test]
async fn test_recalculate_all_returns_job_id() {
    require_database!();
    let app = create_router(test_state().await);

    let response = app
        .oneshot(
            Request::post("/api/coverage/recalculate-all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "started");
    assert!(json["job_id"].as_str().unwrap().starts_with("recalc_"));
}

#[tokio::test]
async fn test_unknown_recalculation_job_http() {
    require_database!();
    let app = create_router(test_state().await);

    let response = app
        .oneshot(
            Request::get("/api/coverage/recalculate-status/recalc_missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_import_without_user_is_not_found() {
    require_database!();
    let app = create_router(test_state().await);

    let response = app
        .oneshot(
            Request::post("/api/import/initial/999999999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
