// SPDX-License-Identifier: MIT

//! Resolver integration tests: path materialisation, city discovery with
//! the offline geocoder fallback, attribution and idempotence.

mod common;

use common::*;
use coverage_tracker::models::activity::NewActivity;
use coverage_tracker::services::{Geocoder, RegionResolver};

/// A geocoder pointed at a dead endpoint always uses the offline fallback.
fn offline_geocoder() -> Geocoder {
    Geocoder::new().with_base_url("http://127.0.0.1:1")
}

fn summary_activity_with_polyline(user_id: i32, encoded: &str, lat: f64, lng: f64) -> NewActivity {
    let mut activity = activity_with_path(user_id, "unused");
    activity.path_wkt = None;
    activity.polyline = Some(encoded.to_string());
    activity.start_latitude = Some(lat);
    activity.start_longitude = Some(lng);
    activity.end_latitude = Some(lat);
    activity.end_longitude = Some(lng);
    activity
}

#[tokio::test]
async fn test_materialize_path_from_encoded_polyline() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    let line = geo::LineString::from(vec![(-1.22, 52.77), (-1.215, 52.772), (-1.21, 52.775)]);
    let encoded = polyline::encode_coordinates(line, 5).unwrap();
    let activity = summary_activity_with_polyline(user.id, &encoded, 52.77, -1.22);
    db.insert_activity(&activity).await.unwrap();

    let resolver = RegionResolver::new(db.clone(), offline_geocoder());
    let materialized = resolver.materialize_paths(user.id).await.unwrap();
    assert!(materialized >= 1);

    let (valid, points): (bool, i32) = sqlx::query_as(
        "SELECT ST_IsValid(path), ST_NPoints(path)::int FROM activities WHERE strava_activity_id = $1",
    )
    .bind(activity.strava_activity_id)
    .fetch_one(db.pool())
    .await
    .unwrap();

    assert!(valid);
    assert_eq!(points, 3);
}

#[tokio::test]
async fn test_materialize_path_from_coordinates() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    // Start and end differ: a two-point linestring.
    let mut two_point = activity_with_path(user.id, "unused");
    two_point.path_wkt = None;
    two_point.start_latitude = Some(52.77);
    two_point.start_longitude = Some(-1.22);
    two_point.end_latitude = Some(52.78);
    two_point.end_longitude = Some(-1.21);
    db.insert_activity(&two_point).await.unwrap();

    // Start == end: the degenerate path.
    let mut degenerate = activity_with_path(user.id, "unused");
    degenerate.path_wkt = None;
    degenerate.start_latitude = Some(52.77);
    degenerate.start_longitude = Some(-1.22);
    degenerate.end_latitude = Some(52.77);
    degenerate.end_longitude = Some(-1.22);
    db.insert_activity(&degenerate).await.unwrap();

    // No coordinates at all: path stays NULL.
    let mut indoor = activity_with_path(user.id, "unused");
    indoor.path_wkt = None;
    db.insert_activity(&indoor).await.unwrap();

    let materialized = db.materialize_coordinate_paths(user.id).await.unwrap();
    assert_eq!(materialized, 2);

    let degenerate_len: f64 = sqlx::query_scalar(
        "SELECT ST_Length(ST_Transform(path, 3857)) FROM activities WHERE strava_activity_id = $1",
    )
    .bind(degenerate.strava_activity_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(degenerate_len, 0.0);

    let indoor_path: Option<bool> = sqlx::query_scalar(
        "SELECT path IS NOT NULL FROM activities WHERE strava_activity_id = $1",
    )
    .bind(indoor.strava_activity_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(indoor_path, Some(false));
}

#[tokio::test]
async fn test_cluster_discovery_with_geocoder_fallback() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    // Deterministic slate: no city may pre-exist near the cluster.
    clear_cities_near(&db, 52.77, -1.22, 60_000.0).await;

    // Ten activities whose starts cluster within ~1 km at (52.77, -1.22).
    for i in 0..10 {
        let jitter = i as f64 * 0.0008;
        let wkt = format!(
            "LINESTRING({} {}, {} {})",
            -1.22 + jitter,
            52.77 + jitter,
            -1.219 + jitter,
            52.771 + jitter
        );
        insert_activity_with_path(&db, user.id, &wkt).await;
    }

    let resolver = RegionResolver::new(db.clone(), offline_geocoder());
    let outcome = resolver.resolve_user(user.id).await.unwrap();

    // The stubbed geocoder fails, so the offline classifier names the city.
    assert_eq!(outcome.cities_discovered, 1);

    let (city_id, country): (i32, String) =
        sqlx::query_as("SELECT id, country_code FROM cities WHERE name = 'Loughborough'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(country, "GB");

    // 10 km buffer in the metric projection: area ≈ π · 10² km².
    let area = db.city_area_km2(city_id).await.unwrap();
    assert!((300.0..330.0).contains(&area), "unexpected buffer area {}", area);

    // All ten activities attributed to the discovered city.
    let attributed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activities WHERE user_id = $1 AND city_id = $2",
    )
    .bind(user.id)
    .bind(city_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(attributed, 10);

    // Property: the new city is at least 20 km from every other centroid.
    let too_close: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM cities other, cities new
        WHERE new.id = $1 AND other.id <> new.id
          AND ST_DWithin(
              ST_Transform(ST_Centroid(new.boundary), 3857),
              ST_Transform(ST_Centroid(other.boundary), 3857),
              20000)
        "#,
    )
    .bind(city_id)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(too_close, 0);
}

#[tokio::test]
async fn test_resolver_pass_is_idempotent() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    clear_cities_near(&db, 53.4, -1.45, 60_000.0).await;

    for i in 0..6 {
        let jitter = i as f64 * 0.0005;
        let wkt = format!(
            "LINESTRING({} {}, {} {})",
            -1.45 + jitter,
            53.4 + jitter,
            -1.449 + jitter,
            53.401 + jitter
        );
        insert_activity_with_path(&db, user.id, &wkt).await;
    }

    let resolver = RegionResolver::new(db.clone(), offline_geocoder());
    let first = resolver.resolve_user(user.id).await.unwrap();
    assert_eq!(first.cities_discovered, 1);
    assert_eq!(first.activities_attributed, 6);

    // Second pass with no new data is a no-op.
    let second = resolver.resolve_user(user.id).await.unwrap();
    assert_eq!(second.paths_materialized, 0);
    assert_eq!(second.cities_discovered, 0);
    assert_eq!(second.activities_attributed, 0);
}

#[tokio::test]
async fn test_attribution_prefers_longest_intersection() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    clear_cities_near(&db, -44.85, 100.3, 80_000.0).await;

    let short_id = format!("short-{}", next_id());
    let long_id = format!("long-{}", next_id());
    create_square_city(&db, &short_id, -44.9, 100.2, 0.1).await;
    let long_city = create_square_city(&db, &long_id, -44.9, 100.3, 0.1).await;

    // The path spends 0.08° in the first city and 0.09° in the second.
    let activity =
        insert_activity_with_path(&db, user.id, "LINESTRING(100.22 -44.85, 100.39 -44.85)").await;

    db.attribute_activities(user.id).await.unwrap();

    let city_id: Option<i32> =
        sqlx::query_scalar("SELECT city_id FROM activities WHERE strava_activity_id = $1")
            .bind(activity)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(city_id, Some(long_city));
}

#[tokio::test]
async fn test_degenerate_path_is_never_attributed() {
    require_database!();
    let db = test_db().await;
    let user = create_user(&db).await;

    clear_cities_near(&db, -30.05, 140.05, 80_000.0).await;
    let name = format!("degenerate-{}", next_id());
    create_square_city(&db, &name, -30.1, 140.0, 0.1).await;

    // Zero-length path located inside the city boundary.
    let activity =
        insert_activity_with_path(&db, user.id, "LINESTRING(140.05 -30.05, 140.05 -30.05)").await;

    db.attribute_activities(user.id).await.unwrap();

    let city_id: Option<i32> =
        sqlx::query_scalar("SELECT city_id FROM activities WHERE strava_activity_id = $1")
            .bind(activity)
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert_eq!(city_id, None, "zero-length intersections must not attribute");
}
