// SPDX-License-Identifier: MIT

//! Coverage-engine integration tests: the area-normalised distance model,
//! the coverage cap, activity-scoped calculation and bulk recalculation.

mod common;

use common::*;
use coverage_tracker::services::CoverageService;
use std::time::Duration;

/// Side length, in degrees at the equator, of a square measuring ~10 km on
/// each side in EPSG:3857 (1° ≈ 111.319 km).
const TEN_KM_DEG: f64 = 0.0898315;

#[tokio::test]
async fn test_city_coverage_distance_ratio() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    // A ~100 km² city: explorable distance 6 000 km.
    let name = format!("ratio-city-{}", next_id());
    let city_id = create_square_city(&db, &name, 0.0, 0.0, TEN_KM_DEG).await;

    // One 60 km activity attributed to it: coverage 1.0 %.
    let sixty_km_deg = 6.0 * TEN_KM_DEG;
    let wkt = format!("LINESTRING(0.01 0.01, {} 0.01)", 0.01 + sixty_km_deg);
    let activity = insert_activity_with_path(&db, user.id, &wkt).await;
    attach_to_city(&db, activity, city_id).await;

    let coverage = CoverageService::new(db.clone());
    let summary = coverage.user_city_coverage(user.id, city_id).await.unwrap();

    assert!(
        (summary.coverage_percent - 1.0).abs() < 0.05,
        "expected ~1.0%, got {}",
        summary.coverage_percent
    );
    assert!((summary.total_streets_km - 6000.0).abs() < 50.0);
}

#[tokio::test]
async fn test_city_coverage_cap() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    let name = format!("cap-city-{}", next_id());
    let city_id = create_square_city(&db, &name, 0.0, 3.0, TEN_KM_DEG).await;

    // ~12 500 km of activity against 6 000 explorable km: cap engages.
    let twelve_thousand_km_deg = 1250.0 * TEN_KM_DEG;
    let wkt = format!("LINESTRING(3.0 0.2, {} 0.2)", 3.0 + twelve_thousand_km_deg);
    let activity = insert_activity_with_path(&db, user.id, &wkt).await;
    attach_to_city(&db, activity, city_id).await;

    let coverage = CoverageService::new(db.clone());
    let summary = coverage.user_city_coverage(user.id, city_id).await.unwrap();

    assert_eq!(summary.coverage_percent, 100.0);
}

#[tokio::test]
async fn test_calculate_activity_coverage_persists_result() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    clear_cities_near(&db, 20.55, 30.25, 80_000.0).await;
    let name = format!("calc-city-{}", next_id());
    let city_id = create_square_city(&db, &name, 20.5, 30.2, 0.1).await;

    let activity =
        insert_activity_with_path(&db, user.id, "LINESTRING(30.21 20.55, 30.28 20.55)").await;

    let coverage = CoverageService::new(db.clone());
    let result = coverage.calculate_activity_coverage(activity).await.unwrap();

    assert_eq!(result.city_id, city_id);
    assert_eq!(result.activity_id, activity);
    assert!(result.coverage_percent > 0.0);
    assert!(result.coverage_percent <= 100.0);
    assert_eq!(result.new_streets_km, 0.0);

    // The activity row carries the attribution and coverage.
    let row = db.activity_coverage(activity).await.unwrap();
    assert_eq!(row.city_id, Some(city_id));
    assert_eq!(row.coverage_percentage, Some(result.coverage_percent));

    // Re-running returns the same value (no concurrent inserts).
    let again = coverage.calculate_activity_coverage(activity).await.unwrap();
    assert_eq!(again.coverage_percent, result.coverage_percent);
}

#[tokio::test]
async fn test_calculate_activity_coverage_errors() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    let coverage = CoverageService::new(db.clone());

    // Unknown activity.
    let err = coverage.calculate_activity_coverage(-1).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");

    // Known activity, but its path overlaps no tracked city.
    clear_cities_near(&db, -50.0, -150.0, 100_000.0).await;
    let lonely =
        insert_activity_with_path(&db, user.id, "LINESTRING(-150.0 -50.0, -149.99 -50.0)").await;
    let err = coverage.calculate_activity_coverage(lonely).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn test_bulk_recalculation_progress_is_observable() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    let name = format!("recalc-city-{}", next_id());
    let city_id = create_square_city(&db, &name, 0.0, 6.0, TEN_KM_DEG).await;

    for i in 0..12 {
        let offset = i as f64 * 0.001;
        let wkt = format!(
            "LINESTRING({} 0.01, {} 0.02)",
            6.01 + offset,
            6.01 + offset
        );
        let activity = insert_activity_with_path(&db, user.id, &wkt).await;
        attach_to_city(&db, activity, city_id).await;
    }

    let coverage = CoverageService::new(db.clone());
    let job_id = coverage.start_recalculate_all();

    let mut samples = Vec::new();
    let mut finished = None;
    for _ in 0..200 {
        let Some(status) = coverage.recalculation_status(&job_id) else {
            panic!("job vanished from registry");
        };
        samples.push(status.progress);
        if status.status != "running" {
            finished = Some(status);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let finished = finished.expect("recalculation did not finish in time");
    assert_eq!(finished.status, "completed");
    assert_eq!(finished.progress, 100);
    // The registry job covers every attributed activity in the store, so
    // the total is at least this test's twelve.
    assert!(finished.total >= 12, "total was {}", finished.total);
    assert_eq!(finished.updated + finished.errors, finished.total);
    assert!(finished.finished_at.is_some());

    // Progress never regresses.
    assert!(samples.windows(2).all(|w| w[0] <= w[1]), "{:?}", samples);

    // Coverage written back onto the rows.
    let covered: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activities WHERE user_id = $1 AND coverage_percentage IS NOT NULL",
    )
    .bind(user.id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(covered, 12);
}

#[tokio::test]
async fn test_unknown_recalculation_job_is_none() {
    require_database!();
    let db = test_db().await;
    let coverage = CoverageService::new(db);
    assert!(coverage.recalculation_status("recalc_missing").is_none());
}

#[tokio::test]
async fn test_coverage_is_bounded_for_all_pairs() {
    require_database!();
    let db = test_db().await;

    // Invariant: every persisted coverage percentage lies in [0, 100].
    let out_of_range: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM activities
        WHERE coverage_percentage IS NOT NULL
          AND (coverage_percentage < 0 OR coverage_percentage > 100)
        "#,
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(out_of_range, 0);
}
