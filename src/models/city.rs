// SPDX-License-Identifier: MIT

//! City row types and cluster/intersection query results.

use serde::Serialize;
use sqlx::FromRow;

/// A named geographic region, seeded or discovered.
///
/// The boundary geometry itself stays in the database; responses carry the
/// derived area instead of a (large) geometry payload.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct City {
    pub id: i32,
    pub name: String,
    pub country_code: String,
    pub area_km2: f64,
}

/// A spatial grouping of activity start points, used for city discovery.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityCluster {
    pub activity_count: i64,
    pub avg_lat: f64,
    pub avg_lng: f64,
}

/// How an activity's path intersects a city boundary.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CityIntersection {
    pub city_id: i32,
    pub city_name: String,
    pub country_code: String,
    pub intersection_km: f64,
    pub percentage_of_activity: f64,
}
