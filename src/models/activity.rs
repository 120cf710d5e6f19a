// SPDX-License-Identifier: MIT

//! Activity row types and the sport-type import filter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Sport types the ingest pipeline accepts.
pub const IMPORTABLE_SPORTS: &[&str] = &[
    "Run",
    "Ride",
    "Walk",
    "Hike",
    "TrailRun",
    "VirtualRun",
    "VirtualRide",
];

/// Whether a sport/activity type pair qualifies for import.
pub fn is_importable_sport(activity_type: &str, sport_type: &str) -> bool {
    IMPORTABLE_SPORTS
        .iter()
        .any(|valid| activity_type == *valid || sport_type == *valid)
}

/// Fields for a new activity row; built by the ingest pipeline from a
/// provider summary (and, in stream mode, a decoded latlng stream).
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i32,
    pub strava_activity_id: i64,
    pub name: String,
    pub activity_type: String,
    pub sport_type: String,
    pub distance_km: f64,
    pub moving_time_s: i32,
    pub elapsed_time_s: i32,
    pub elevation_gain_m: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub polyline: Option<String>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    /// Pre-built WKT linestring (stream mode only).
    pub path_wkt: Option<String>,
}

/// A city-attributed activity, as iterated by bulk recalculation.
#[derive(Debug, Clone, FromRow)]
pub struct AttributedActivity {
    pub strava_activity_id: i64,
    pub user_id: i32,
    pub city_id: i32,
    pub city_name: String,
}

/// Stored coverage of one activity, for the read endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivityCoverageRow {
    pub strava_activity_id: i64,
    pub city_id: Option<i32>,
    pub city_name: Option<String>,
    pub coverage_percentage: Option<f64>,
}

/// An uncommented activity whose coverage exceeds the user's previous
/// maximum in the same city.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoverageIncrease {
    pub user_id: i32,
    pub activity_id: i64,
    pub city_id: i32,
    pub city_name: String,
    pub previous_coverage: f64,
    pub new_coverage: f64,
    pub increase: f64,
    pub sport_type: String,
    pub start_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importable_sports() {
        assert!(is_importable_sport("Run", ""));
        assert!(is_importable_sport("", "TrailRun"));
        assert!(is_importable_sport("Ride", "Ride"));
        assert!(!is_importable_sport("Swim", "Swim"));
        assert!(!is_importable_sport("Yoga", ""));
    }
}
