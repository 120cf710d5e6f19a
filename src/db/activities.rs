//! Activity storage: inserts, path materialisation and city attribution.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::activity::{ActivityCoverageRow, AttributedActivity, NewActivity};

/// Build a WKT LINESTRING from `(lng, lat)` pairs.
///
/// A single point is duplicated: PostGIS rejects one-point linestrings, and
/// the zero-length result still behaves as the degenerate path (no
/// intersection with any boundary by length ranking). Returns `None` for an
/// empty input.
pub fn linestring_wkt<I>(lnglat: I) -> Option<String>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let points: Vec<String> = lnglat
        .into_iter()
        .map(|(lng, lat)| format!("{} {}", lng, lat))
        .collect();

    match points.len() {
        0 => None,
        1 => Some(format!("LINESTRING({}, {})", points[0], points[0])),
        _ => Some(format!("LINESTRING({})", points.join(", "))),
    }
}

impl Db {
    // ─── Inserts ─────────────────────────────────────────────────

    /// Insert an activity. Returns `false` when `strava_activity_id` was
    /// already stored (the importer skips duplicates silently).
    pub async fn insert_activity(&self, activity: &NewActivity) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO activities (
                user_id, strava_activity_id, name, activity_type, sport_type,
                distance_km, moving_time_s, elapsed_time_s, elevation_gain_m,
                start_time, timezone, polyline,
                start_latitude, start_longitude, end_latitude, end_longitude,
                path
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                CASE WHEN $17::text IS NOT NULL THEN ST_GeomFromText($17, 4326) ELSE NULL END
            )
            ON CONFLICT (strava_activity_id) DO NOTHING
            "#,
        )
        .bind(activity.user_id)
        .bind(activity.strava_activity_id)
        .bind(&activity.name)
        .bind(&activity.activity_type)
        .bind(&activity.sport_type)
        .bind(activity.distance_km)
        .bind(activity.moving_time_s)
        .bind(activity.elapsed_time_s)
        .bind(activity.elevation_gain_m)
        .bind(activity.start_time)
        .bind(&activity.timezone)
        .bind(&activity.polyline)
        .bind(activity.start_latitude)
        .bind(activity.start_longitude)
        .bind(activity.end_latitude)
        .bind(activity.end_longitude)
        .bind(&activity.path_wkt)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_activities(&self, user_id: i32) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    // ─── Path Materialisation ────────────────────────────────────

    /// Activities of this user that still need a path built from their
    /// encoded polyline. The decode happens in-process (see the resolver).
    pub async fn activities_pending_polyline_decode(
        &self,
        user_id: i32,
    ) -> Result<Vec<(i32, String)>> {
        let rows: Vec<(i32, String)> = sqlx::query_as(
            r#"
            SELECT id, polyline
            FROM activities
            WHERE user_id = $1 AND path IS NULL AND polyline IS NOT NULL AND polyline <> ''
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn set_activity_path(&self, activity_id: i32, wkt: &str) -> Result<()> {
        sqlx::query(
            "UPDATE activities SET path = ST_GeomFromText($2, 4326), updated_at = now() WHERE id = $1",
        )
        .bind(activity_id)
        .bind(wkt)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Build paths from start/end coordinates for activities still lacking
    /// one. When start and end coincide (or no end is known) the start point
    /// is duplicated, producing the degenerate zero-length path. Activities
    /// with no coordinate data at all keep `path = NULL`.
    pub async fn materialize_coordinate_paths(&self, user_id: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE activities
            SET path = ST_GeomFromText(
                    'LINESTRING(' || start_longitude || ' ' || start_latitude || ', ' ||
                    CASE
                        WHEN end_latitude IS NOT NULL AND end_longitude IS NOT NULL
                             AND (end_latitude <> start_latitude OR end_longitude <> start_longitude)
                        THEN end_longitude || ' ' || end_latitude
                        ELSE start_longitude || ' ' || start_latitude
                    END || ')', 4326),
                updated_at = now()
            WHERE user_id = $1
              AND path IS NULL
              AND start_latitude IS NOT NULL
              AND start_longitude IS NOT NULL
            "#,
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    // ─── Attribution ─────────────────────────────────────────────

    /// Assign each unattributed activity with a path to the city whose
    /// boundary has the longest intersection with it; ties go to the
    /// smallest city id. Activities intersecting no city stay unattributed.
    pub async fn attribute_activities(&self, user_id: i32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE activities
            SET city_id = (
                    SELECT c.id
                    FROM cities c
                    WHERE ST_Intersects(activities.path, c.boundary)
                      AND ST_Length(ST_Intersection(activities.path, c.boundary)) > 0
                    ORDER BY ST_Length(ST_Transform(ST_Intersection(activities.path, c.boundary), 3857)) DESC,
                             c.id ASC
                    LIMIT 1
                ),
                updated_at = now()
            WHERE user_id = $1 AND path IS NOT NULL AND city_id IS NULL
            "#,
        )
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    // ─── Coverage Writes & Reads ─────────────────────────────────

    /// Look up the owner of an activity; `NotFound` when unknown.
    pub async fn activity_owner(&self, strava_activity_id: i64) -> Result<i32> {
        let user_id: Option<i32> =
            sqlx::query_scalar("SELECT user_id FROM activities WHERE strava_activity_id = $1")
                .bind(strava_activity_id)
                .fetch_optional(self.pool())
                .await?;

        user_id.ok_or_else(|| {
            AppError::NotFound(format!("no activity with ID {}", strava_activity_id))
        })
    }

    pub async fn update_activity_coverage(
        &self,
        strava_activity_id: i64,
        city_id: i32,
        coverage_percent: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE activities
            SET city_id = $2, coverage_percentage = $3, updated_at = now()
            WHERE strava_activity_id = $1
            "#,
        )
        .bind(strava_activity_id)
        .bind(city_id)
        .bind(coverage_percent)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_coverage_percentage(
        &self,
        strava_activity_id: i64,
        coverage_percent: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE activities
            SET coverage_percentage = $2, updated_at = now()
            WHERE strava_activity_id = $1
            "#,
        )
        .bind(strava_activity_id)
        .bind(coverage_percent)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All city-attributed activities (the bulk-recalculation working set).
    pub async fn attributed_activities(&self) -> Result<Vec<AttributedActivity>> {
        let rows = sqlx::query_as::<_, AttributedActivity>(
            r#"
            SELECT a.strava_activity_id, a.user_id, a.city_id, c.name AS city_name
            FROM activities a
            JOIN cities c ON a.city_id = c.id
            WHERE a.city_id IS NOT NULL
            ORDER BY a.strava_activity_id
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn attributed_activities_for_user(
        &self,
        user_id: i32,
    ) -> Result<Vec<AttributedActivity>> {
        let rows = sqlx::query_as::<_, AttributedActivity>(
            r#"
            SELECT a.strava_activity_id, a.user_id, a.city_id, c.name AS city_name
            FROM activities a
            JOIN cities c ON a.city_id = c.id
            WHERE a.user_id = $1 AND a.city_id IS NOT NULL
            ORDER BY a.strava_activity_id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Stored coverage of a single activity, for the read endpoint.
    pub async fn activity_coverage(
        &self,
        strava_activity_id: i64,
    ) -> Result<ActivityCoverageRow> {
        let row = sqlx::query_as::<_, ActivityCoverageRow>(
            r#"
            SELECT a.strava_activity_id, a.city_id, c.name AS city_name, a.coverage_percentage
            FROM activities a
            LEFT JOIN cities c ON a.city_id = c.id
            WHERE a.strava_activity_id = $1
            "#,
        )
        .bind(strava_activity_id)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| {
            AppError::NotFound(format!("no activity with ID {}", strava_activity_id))
        })
    }

    /// Counts used by the processing-status endpoint.
    pub async fn processing_counts(&self, user_id: i32) -> Result<(i64, i64, i64)> {
        let activities = self.count_activities(user_id).await?;
        let cities: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT city_id) FROM activities WHERE user_id = $1 AND city_id IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        let covered: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM activities WHERE user_id = $1 AND coverage_percentage IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok((activities, cities, covered))
    }
}
