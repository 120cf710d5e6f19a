// SPDX-License-Identifier: MIT

//! Custom-area row types and grid-coverage telemetry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A user-drawn polygon with its own coverage metric.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CustomArea {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    /// Boundary as WKT (`POLYGON((lng lat, ...))`).
    pub geometry_wkt: String,
    pub coverage_percentage: Option<f64>,
    pub activities_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of the weighted-grid coverage query. Only `coverage_percentage`
/// and `activities_count` are persisted; the rest is logged telemetry.
#[derive(Debug, Clone, FromRow)]
pub struct GridCoverage {
    pub coverage_percentage: f64,
    pub activities_count: i64,
    pub grid_points_total: i64,
    pub direct_covered_points: i64,
    pub close_covered_points: i64,
    pub moderate_covered_points: i64,
    pub weighted_coverage_percentage: f64,
    pub avg_activity_diversity: f64,
    pub max_activity_diversity: i64,
    pub coverage_density_per_sqkm: f64,
}
