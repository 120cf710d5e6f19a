//! City storage: cluster discovery queries, proximity checks, boundary
//! creation and the measurement scalars used by the coverage engine.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::city::{ActivityCluster, City, CityIntersection};

/// Minimum distance between a new discovered city and any existing city
/// centroid, in metres.
pub const DISCOVERY_SEPARATION_M: f64 = 20_000.0;

/// Radius of the circular boundary created for a discovered city, metres.
pub const DISCOVERED_CITY_RADIUS_M: f64 = 10_000.0;

impl Db {
    // ─── Discovery ───────────────────────────────────────────────

    /// Cluster the user's activity start points into ~11 km cells (0.1°
    /// rounding). Only cells with at least five activities qualify, ordered
    /// by size, capped at the top twenty.
    pub async fn activity_start_clusters(&self, user_id: i32) -> Result<Vec<ActivityCluster>> {
        let rows = sqlx::query_as::<_, ActivityCluster>(
            r#"
            SELECT
                COUNT(*) AS activity_count,
                AVG(ST_Y(ST_StartPoint(path))) AS avg_lat,
                AVG(ST_X(ST_StartPoint(path))) AS avg_lng
            FROM activities
            WHERE user_id = $1 AND path IS NOT NULL
            GROUP BY ROUND(ST_Y(ST_StartPoint(path))::numeric, 1),
                     ROUND(ST_X(ST_StartPoint(path))::numeric, 1)
            HAVING COUNT(*) >= 5
            ORDER BY activity_count DESC
            LIMIT 20
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Near-duplicate suppression: true when a city with the same name and
    /// country exists, or any city centroid lies within 20 km of the given
    /// point (distance measured after metric reprojection).
    pub async fn city_exists_nearby(
        &self,
        name: &str,
        country_code: &str,
        lat: f64,
        lng: f64,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM cities
            WHERE (LOWER(name) = LOWER($1) AND country_code = $2)
               OR ST_DWithin(
                      ST_Transform(ST_SetSRID(ST_MakePoint($3, $4), 4326), 3857),
                      ST_Transform(ST_Centroid(boundary), 3857),
                      $5)
            "#,
        )
        .bind(name)
        .bind(country_code)
        .bind(lng)
        .bind(lat)
        .bind(DISCOVERY_SEPARATION_M)
        .fetch_one(self.pool())
        .await?;

        Ok(count > 0)
    }

    /// Create a discovered city: a 10 km buffer around the cluster centre,
    /// buffered in the metric projection and reprojected back to WGS84.
    pub async fn create_city_from_center(
        &self,
        name: &str,
        country_code: &str,
        lat: f64,
        lng: f64,
    ) -> Result<i32> {
        let city_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO cities (name, country_code, boundary)
            VALUES ($1, $2,
                    ST_Transform(
                        ST_Buffer(
                            ST_Transform(ST_SetSRID(ST_MakePoint($3, $4), 4326), 3857),
                            $5),
                        4326))
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(country_code)
        .bind(lng)
        .bind(lat)
        .bind(DISCOVERED_CITY_RADIUS_M)
        .fetch_one(self.pool())
        .await?;

        Ok(city_id)
    }

    /// Upsert a seed city boundary from WKT, matching on (name, country).
    pub async fn upsert_city_boundary(
        &self,
        name: &str,
        country_code: &str,
        boundary_wkt: &str,
    ) -> Result<i32> {
        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM cities WHERE LOWER(name) = LOWER($1) AND country_code = $2",
        )
        .bind(name)
        .bind(country_code)
        .fetch_optional(self.pool())
        .await?;

        if let Some(id) = existing {
            sqlx::query(
                "UPDATE cities SET boundary = ST_GeomFromText($2, 4326), updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(boundary_wkt)
            .execute(self.pool())
            .await?;
            return Ok(id);
        }

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO cities (name, country_code, boundary) VALUES ($1, $2, ST_GeomFromText($3, 4326)) RETURNING id",
        )
        .bind(name)
        .bind(country_code)
        .bind(boundary_wkt)
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub async fn get_city(&self, city_id: i32) -> Result<City> {
        let city = sqlx::query_as::<_, City>(
            r#"
            SELECT id, name, country_code,
                   ST_Area(ST_Transform(boundary, 3857)) / 1000000 AS area_km2
            FROM cities
            WHERE id = $1
            "#,
        )
        .bind(city_id)
        .fetch_optional(self.pool())
        .await?;

        city.ok_or_else(|| AppError::NotFound(format!("no city with ID {}", city_id)))
    }

    // ─── Measurements ────────────────────────────────────────────

    /// City area in km², measured in the metric projection.
    pub async fn city_area_km2(&self, city_id: i32) -> Result<f64> {
        let area: Option<f64> = sqlx::query_scalar(
            "SELECT ST_Area(ST_Transform(boundary, 3857)) / 1000000 FROM cities WHERE id = $1",
        )
        .bind(city_id)
        .fetch_optional(self.pool())
        .await?;

        area.ok_or_else(|| AppError::NotFound(format!("no city with ID {}", city_id)))
    }

    /// Total path length (km) of the user's attributed activities in a city.
    pub async fn user_distance_km_in_city(&self, user_id: i32, city_id: i32) -> Result<f64> {
        let distance: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(ST_Length(ST_Transform(path, 3857)) / 1000), 0)
            FROM activities
            WHERE user_id = $1 AND city_id = $2 AND path IS NOT NULL
            "#,
        )
        .bind(user_id)
        .bind(city_id)
        .fetch_one(self.pool())
        .await?;

        Ok(distance)
    }

    /// Cities intersecting an activity's path, longest intersection first
    /// (ties broken by city id). Zero-length touches are excluded.
    pub async fn intersecting_cities(
        &self,
        strava_activity_id: i64,
    ) -> Result<Vec<CityIntersection>> {
        let rows = sqlx::query_as::<_, CityIntersection>(
            r#"
            SELECT
                c.id AS city_id,
                c.name AS city_name,
                c.country_code,
                ST_Length(ST_Transform(ST_Intersection(a.path, c.boundary), 3857)) / 1000
                    AS intersection_km,
                CASE
                    WHEN ST_Length(ST_Transform(a.path, 3857)) > 0 THEN
                        (ST_Length(ST_Transform(ST_Intersection(a.path, c.boundary), 3857)) /
                         ST_Length(ST_Transform(a.path, 3857))) * 100
                    ELSE 0
                END AS percentage_of_activity
            FROM cities c, activities a
            WHERE a.strava_activity_id = $1
              AND a.path IS NOT NULL
              AND ST_Intersects(a.path, c.boundary)
              AND ST_Length(ST_Intersection(a.path, c.boundary)) > 0
            ORDER BY intersection_km DESC, c.id ASC
            "#,
        )
        .bind(strava_activity_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
