// SPDX-License-Identifier: MIT

//! Shared helpers for integration tests.
//!
//! Tests need a Postgres database with PostGIS available. Set
//! `TEST_DATABASE_URL` to run them; without it every test skips.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use coverage_tracker::db::Db;
use coverage_tracker::models::activity::NewActivity;
use coverage_tracker::models::user::User;
use std::sync::atomic::{AtomicI64, Ordering};

/// Check if a test database is configured.
pub fn database_available() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Skip test with a message if no test database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        if !$crate::common::database_available() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Connect to the test database (applies the schema).
pub async fn test_db() -> Db {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    Db::connect(&url)
        .await
        .expect("Failed to connect to test database")
}

/// Process-unique id source so parallel tests never collide on unique
/// columns (strava ids are unique across users).
pub fn next_id() -> i64 {
    static COUNTER: AtomicI64 = AtomicI64::new(0);
    Utc::now().timestamp_micros() + COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Create a fresh user with a unique Strava id.
pub async fn create_user(db: &Db) -> User {
    db.get_or_create_user(next_id(), "Test Athlete")
        .await
        .expect("create user")
}

/// Store a token for the user.
pub async fn store_token(db: &Db, user_id: i32, access_token: &str) {
    db.upsert_token(
        user_id,
        access_token,
        "refresh-token",
        Utc::now() + chrono::Duration::hours(6),
    )
    .await
    .expect("store token");
}

/// Create a city with a square boundary: `side_deg` degrees on each side,
/// south-west corner at `(lat, lng)`. Returns the city id.
pub async fn create_square_city(db: &Db, name: &str, lat: f64, lng: f64, side_deg: f64) -> i32 {
    let wkt = format!(
        "POLYGON(({lng} {lat},{lng2} {lat},{lng2} {lat2},{lng} {lat2},{lng} {lat}))",
        lng = lng,
        lat = lat,
        lng2 = lng + side_deg,
        lat2 = lat + side_deg,
    );
    db.upsert_city_boundary(name, "XX", &wkt)
        .await
        .expect("create city")
}

/// Delete a city (and anything referencing it) so discovery tests start
/// from a clean slate.
pub async fn delete_city_named(db: &Db, name: &str) {
    sqlx::query(
        "UPDATE activities SET city_id = NULL WHERE city_id IN (SELECT id FROM cities WHERE name = $1)",
    )
    .bind(name)
    .execute(db.pool())
    .await
    .expect("unlink activities");
    sqlx::query("DELETE FROM cities WHERE name = $1")
        .bind(name)
        .execute(db.pool())
        .await
        .expect("delete city");
}

/// Remove every city whose centroid lies within `radius_m` of a point, so
/// near-duplicate suppression tests are deterministic across runs.
pub async fn clear_cities_near(db: &Db, lat: f64, lng: f64, radius_m: f64) {
    sqlx::query(
        r#"
        UPDATE activities SET city_id = NULL WHERE city_id IN (
            SELECT id FROM cities
            WHERE ST_DWithin(
                ST_Transform(ST_SetSRID(ST_MakePoint($1, $2), 4326), 3857),
                ST_Transform(ST_Centroid(boundary), 3857),
                $3)
        )
        "#,
    )
    .bind(lng)
    .bind(lat)
    .bind(radius_m)
    .execute(db.pool())
    .await
    .expect("unlink activities");

    sqlx::query(
        r#"
        DELETE FROM cities
        WHERE ST_DWithin(
            ST_Transform(ST_SetSRID(ST_MakePoint($1, $2), 4326), 3857),
            ST_Transform(ST_Centroid(boundary), 3857),
            $3)
        "#,
    )
    .bind(lng)
    .bind(lat)
    .bind(radius_m)
    .execute(db.pool())
    .await
    .expect("clear nearby cities");
}

/// Minimal activity row with an explicit path.
pub fn activity_with_path(user_id: i32, path_wkt: &str) -> NewActivity {
    NewActivity {
        user_id,
        strava_activity_id: next_id(),
        name: "Test Activity".to_string(),
        activity_type: "Run".to_string(),
        sport_type: "Run".to_string(),
        distance_km: 5.0,
        moving_time_s: 1800,
        elapsed_time_s: 1900,
        elevation_gain_m: 10.0,
        start_time: Some(Utc::now()),
        timezone: Some("(GMT+00:00) Europe/London".to_string()),
        polyline: None,
        start_latitude: None,
        start_longitude: None,
        end_latitude: None,
        end_longitude: None,
        path_wkt: Some(path_wkt.to_string()),
    }
}

/// Insert an activity with a path, returning its Strava id.
pub async fn insert_activity_with_path(db: &Db, user_id: i32, path_wkt: &str) -> i64 {
    let activity = activity_with_path(user_id, path_wkt);
    let id = activity.strava_activity_id;
    assert!(db.insert_activity(&activity).await.expect("insert activity"));
    id
}

/// Attribute an activity to a city directly, bypassing the resolver.
pub async fn attach_to_city(db: &Db, strava_activity_id: i64, city_id: i32) {
    sqlx::query("UPDATE activities SET city_id = $2 WHERE strava_activity_id = $1")
        .bind(strava_activity_id)
        .bind(city_id)
        .execute(db.pool())
        .await
        .expect("attach to city");
}

/// Attribute an activity to a city and set its coverage directly, for
/// tests exercising downstream consumers.
pub async fn set_activity_coverage(
    db: &Db,
    strava_activity_id: i64,
    city_id: i32,
    coverage: f64,
    start_time: DateTime<Utc>,
) {
    sqlx::query(
        r#"
        UPDATE activities
        SET city_id = $2, coverage_percentage = $3, start_time = $4
        WHERE strava_activity_id = $1
        "#,
    )
    .bind(strava_activity_id)
    .bind(city_id)
    .bind(coverage)
    .bind(start_time)
    .execute(db.pool())
    .await
    .expect("set coverage");
}
