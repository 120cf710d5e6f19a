//! Custom-area storage, including the weighted-grid coverage query.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::custom_area::{CustomArea, GridCoverage};

impl Db {
    pub async fn create_custom_area(
        &self,
        user_id: i32,
        name: &str,
        polygon_wkt: &str,
    ) -> Result<CustomArea> {
        let area = sqlx::query_as::<_, CustomArea>(
            r#"
            INSERT INTO custom_areas (user_id, name, geometry)
            VALUES ($1, $2, ST_GeomFromText($3, 4326))
            RETURNING id, user_id, name, ST_AsText(geometry) AS geometry_wkt,
                      coverage_percentage, activities_count, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(polygon_wkt)
        .fetch_one(self.pool())
        .await?;

        Ok(area)
    }

    pub async fn get_custom_area(&self, area_id: i32) -> Result<CustomArea> {
        let area = sqlx::query_as::<_, CustomArea>(
            r#"
            SELECT id, user_id, name, ST_AsText(geometry) AS geometry_wkt,
                   coverage_percentage, activities_count, created_at, updated_at
            FROM custom_areas
            WHERE id = $1
            "#,
        )
        .bind(area_id)
        .fetch_optional(self.pool())
        .await?;

        area.ok_or_else(|| AppError::NotFound(format!("no custom area with ID {}", area_id)))
    }

    pub async fn custom_areas_for_user(&self, user_id: i32) -> Result<Vec<CustomArea>> {
        let areas = sqlx::query_as::<_, CustomArea>(
            r#"
            SELECT id, user_id, name, ST_AsText(geometry) AS geometry_wkt,
                   coverage_percentage, activities_count, created_at, updated_at
            FROM custom_areas
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(areas)
    }

    pub async fn update_custom_area_coverage(
        &self,
        area_id: i32,
        coverage_percent: f64,
        activities_count: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE custom_areas
            SET coverage_percentage = $2, activities_count = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(area_id)
        .bind(coverage_percent)
        .bind(activities_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Weighted-grid coverage of a custom area.
    ///
    /// Generates a 0.0005° (~50 m) lattice inside the polygon, then tests
    /// each point against the user's intersecting activity paths at three
    /// metric buffer distances: 25 m (weight 3), 50 m (weight 2) and 100 m
    /// (weight 1). The primary percentage is direct-covered points over
    /// total points; the remaining columns are telemetry.
    pub async fn custom_area_grid_coverage(
        &self,
        user_id: i32,
        area_id: i32,
    ) -> Result<GridCoverage> {
        let coverage = sqlx::query_as::<_, GridCoverage>(
            r#"
            WITH area_geometry AS (
                SELECT geometry, ST_Area(ST_Transform(geometry, 3857)) AS area_sqm
                FROM custom_areas WHERE id = $2
            ),
            intersecting_activities AS (
                SELECT DISTINCT a.id, a.path, a.activity_type
                FROM activities a, area_geometry ag
                WHERE a.user_id = $1
                  AND a.path IS NOT NULL
                  AND ST_Intersects(a.path, ag.geometry)
            ),
            area_bounds AS (
                SELECT
                    ST_XMin(geometry) AS min_x, ST_YMin(geometry) AS min_y,
                    ST_XMax(geometry) AS max_x, ST_YMax(geometry) AS max_y,
                    geometry, area_sqm
                FROM area_geometry
            ),
            fine_grid AS (
                SELECT
                    ST_SetSRID(ST_MakePoint(
                        ab.min_x + (x::double precision * 0.0005),
                        ab.min_y + (y::double precision * 0.0005)
                    ), 4326) AS point
                FROM area_bounds ab,
                generate_series(0, ((ab.max_x - ab.min_x) / 0.0005)::integer) AS x,
                generate_series(0, ((ab.max_y - ab.min_y) / 0.0005)::integer) AS y
                WHERE ST_Contains(ab.geometry, ST_SetSRID(ST_MakePoint(
                    ab.min_x + (x::double precision * 0.0005),
                    ab.min_y + (y::double precision * 0.0005)
                ), 4326))
            ),
            coverage_layers AS (
                SELECT
                    CASE WHEN EXISTS (
                        SELECT 1 FROM intersecting_activities ia
                        WHERE ST_DWithin(ST_Transform(ia.path, 3857), ST_Transform(fg.point, 3857), 25)
                    ) THEN 3 ELSE 0 END AS direct_coverage,
                    CASE WHEN EXISTS (
                        SELECT 1 FROM intersecting_activities ia
                        WHERE ST_DWithin(ST_Transform(ia.path, 3857), ST_Transform(fg.point, 3857), 50)
                    ) THEN 2 ELSE 0 END AS close_coverage,
                    CASE WHEN EXISTS (
                        SELECT 1 FROM intersecting_activities ia
                        WHERE ST_DWithin(ST_Transform(ia.path, 3857), ST_Transform(fg.point, 3857), 100)
                    ) THEN 1 ELSE 0 END AS moderate_coverage,
                    (SELECT COUNT(DISTINCT ia.activity_type)
                     FROM intersecting_activities ia
                     WHERE ST_DWithin(ST_Transform(ia.path, 3857), ST_Transform(fg.point, 3857), 100)
                    ) AS activity_types_count
                FROM fine_grid fg
            ),
            coverage_stats AS (
                SELECT
                    COUNT(*) AS total_points,
                    SUM(CASE WHEN direct_coverage > 0 THEN 1 ELSE 0 END) AS direct_covered_points,
                    SUM(CASE WHEN close_coverage > 0 THEN 1 ELSE 0 END) AS close_covered_points,
                    SUM(CASE WHEN moderate_coverage > 0 THEN 1 ELSE 0 END) AS moderate_covered_points,
                    SUM(GREATEST(direct_coverage, close_coverage, moderate_coverage)) AS weighted_coverage_score,
                    AVG(activity_types_count) AS avg_activity_diversity,
                    MAX(activity_types_count) AS max_activity_diversity
                FROM coverage_layers
            )
            SELECT
                CASE WHEN cs.total_points > 0
                    THEN LEAST((cs.direct_covered_points::double precision / cs.total_points) * 100, 100)
                    ELSE 0
                END::double precision AS coverage_percentage,
                (SELECT COUNT(*) FROM intersecting_activities) AS activities_count,
                cs.total_points AS grid_points_total,
                COALESCE(cs.direct_covered_points, 0) AS direct_covered_points,
                COALESCE(cs.close_covered_points, 0) AS close_covered_points,
                COALESCE(cs.moderate_covered_points, 0) AS moderate_covered_points,
                CASE WHEN cs.total_points > 0
                    THEN LEAST((cs.weighted_coverage_score::double precision / (cs.total_points * 3)) * 100, 100)
                    ELSE 0
                END::double precision AS weighted_coverage_percentage,
                COALESCE(cs.avg_activity_diversity, 0)::double precision AS avg_activity_diversity,
                COALESCE(cs.max_activity_diversity, 0)::bigint AS max_activity_diversity,
                CASE WHEN ab.area_sqm > 0
                    THEN COALESCE(cs.direct_covered_points, 0)::double precision / (ab.area_sqm / 1000000.0)
                    ELSE 0
                END::double precision AS coverage_density_per_sqkm
            FROM coverage_stats cs, area_bounds ab
            "#,
        )
        .bind(user_id)
        .bind(area_id)
        .fetch_optional(self.pool())
        .await?;

        coverage.ok_or_else(|| AppError::NotFound(format!("no custom area with ID {}", area_id)))
    }
}
