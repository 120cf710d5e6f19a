//! Custom-area service: polygon validation and grid coverage calculation.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::custom_area::CustomArea;

/// User-drawn areas with weighted-grid coverage.
#[derive(Clone)]
pub struct CustomAreaService {
    db: Db,
}

impl CustomAreaService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a custom area from `[lat, lng]` vertices. The polygon must
    /// have at least three distinct vertices and is closed automatically.
    pub async fn create(
        &self,
        user_id: i32,
        name: &str,
        coordinates: &[[f64; 2]],
    ) -> Result<CustomArea> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("no user with ID {}", user_id)));
        }

        let wkt = polygon_wkt(coordinates)?;
        self.db.create_custom_area(user_id, name, &wkt).await
    }

    pub async fn get(&self, area_id: i32) -> Result<CustomArea> {
        self.db.get_custom_area(area_id).await
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<CustomArea>> {
        self.db.custom_areas_for_user(user_id).await
    }

    /// Kick off the grid coverage calculation in the background and return
    /// the area's current state immediately.
    pub async fn start_coverage_calculation(&self, area_id: i32) -> Result<CustomArea> {
        let area = self.db.get_custom_area(area_id).await?;

        let db = self.db.clone();
        let user_id = area.user_id;
        tokio::spawn(async move {
            calculate_coverage(db, area_id, user_id).await;
        });

        Ok(area)
    }
}

/// Run the weighted-grid query and persist the primary result. The grid
/// breakdown beyond `coverage_percentage`/`activities_count` is telemetry
/// and only logged.
async fn calculate_coverage(db: Db, area_id: i32, user_id: i32) {
    tracing::info!(area_id, user_id, "Starting custom-area coverage calculation");

    let coverage = match db.custom_area_grid_coverage(user_id, area_id).await {
        Ok(coverage) => coverage,
        Err(e) => {
            tracing::error!(area_id, error = %e, "Custom-area coverage query failed");
            return;
        }
    };

    if let Err(e) = db
        .update_custom_area_coverage(
            area_id,
            coverage.coverage_percentage,
            coverage.activities_count as i32,
        )
        .await
    {
        tracing::error!(area_id, error = %e, "Failed to persist custom-area coverage");
        return;
    }

    tracing::info!(
        area_id,
        coverage = coverage.coverage_percentage,
        activities = coverage.activities_count,
        grid_points = coverage.grid_points_total,
        direct = coverage.direct_covered_points,
        close = coverage.close_covered_points,
        moderate = coverage.moderate_covered_points,
        weighted = coverage.weighted_coverage_percentage,
        avg_diversity = coverage.avg_activity_diversity,
        max_diversity = coverage.max_activity_diversity,
        density_per_sqkm = coverage.coverage_density_per_sqkm,
        "Custom-area coverage calculated"
    );
}

/// Convert `[lat, lng]` vertices to a WKT polygon (lng lat order), closing
/// the ring when the caller left it open.
pub fn polygon_wkt(coordinates: &[[f64; 2]]) -> Result<String> {
    let mut distinct: Vec<[f64; 2]> = Vec::new();
    for coord in coordinates {
        if !distinct.contains(coord) {
            distinct.push(*coord);
        }
    }
    if distinct.len() < 3 {
        return Err(AppError::Invalid(
            "polygon must have at least 3 distinct vertices".to_string(),
        ));
    }

    let mut points: Vec<String> = coordinates
        .iter()
        .map(|coord| format!("{} {}", coord[1], coord[0]))
        .collect();

    let first = coordinates[0];
    let last = coordinates[coordinates.len() - 1];
    if first != last {
        points.push(format!("{} {}", first[1], first[0]));
    }

    Ok(format!("POLYGON(({}))", points.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_wkt_closes_open_ring() {
        let wkt = polygon_wkt(&[[52.0, -1.0], [52.1, -1.0], [52.1, -1.1]]).unwrap();
        assert_eq!(wkt, "POLYGON((-1 52,-1 52.1,-1.1 52.1,-1 52))");
    }

    #[test]
    fn test_polygon_wkt_keeps_closed_ring() {
        let wkt =
            polygon_wkt(&[[52.0, -1.0], [52.1, -1.0], [52.1, -1.1], [52.0, -1.0]]).unwrap();
        assert_eq!(wkt, "POLYGON((-1 52,-1 52.1,-1.1 52.1,-1 52))");
    }

    #[test]
    fn test_polygon_wkt_rejects_too_few_vertices() {
        let err = polygon_wkt(&[[52.0, -1.0], [52.1, -1.0]]).unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }

    #[test]
    fn test_polygon_wkt_rejects_duplicate_vertices() {
        // Three vertices but only two distinct points.
        let err = polygon_wkt(&[[52.0, -1.0], [52.0, -1.0], [52.1, -1.0]]).unwrap_err();
        assert!(matches!(err, AppError::Invalid(_)));
    }
}
