//! Comment settings and the coverage-delta query backing the notifier.

use crate::db::Db;
use crate::error::Result;
use crate::models::settings::CommentSettings;
use crate::models::CoverageIncrease;

impl Db {
    /// Fetch the user's comment settings, or the synthetic default row when
    /// none has been stored yet.
    pub async fn get_comment_settings(&self, user_id: i32) -> Result<CommentSettings> {
        let settings = sqlx::query_as::<_, CommentSettings>(
            r#"
            SELECT user_id, enabled, running_enabled, cycling_enabled, walking_enabled,
                   hiking_enabled, ebiking_enabled, skiing_enabled, comment_template,
                   min_coverage_increase, custom_areas_enabled
            FROM comment_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(settings.unwrap_or_else(|| CommentSettings::default_for(user_id)))
    }

    pub async fn upsert_comment_settings(&self, settings: &CommentSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO comment_settings (
                user_id, enabled, running_enabled, cycling_enabled, walking_enabled,
                hiking_enabled, ebiking_enabled, skiing_enabled, comment_template,
                min_coverage_increase, custom_areas_enabled
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                running_enabled = EXCLUDED.running_enabled,
                cycling_enabled = EXCLUDED.cycling_enabled,
                walking_enabled = EXCLUDED.walking_enabled,
                hiking_enabled = EXCLUDED.hiking_enabled,
                ebiking_enabled = EXCLUDED.ebiking_enabled,
                skiing_enabled = EXCLUDED.skiing_enabled,
                comment_template = EXCLUDED.comment_template,
                min_coverage_increase = EXCLUDED.min_coverage_increase,
                custom_areas_enabled = EXCLUDED.custom_areas_enabled,
                updated_at = now()
            "#,
        )
        .bind(settings.user_id)
        .bind(settings.enabled)
        .bind(settings.running_enabled)
        .bind(settings.cycling_enabled)
        .bind(settings.walking_enabled)
        .bind(settings.hiking_enabled)
        .bind(settings.ebiking_enabled)
        .bind(settings.skiing_enabled)
        .bind(&settings.comment_template)
        .bind(settings.min_coverage_increase)
        .bind(settings.custom_areas_enabled)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Uncommented activities whose coverage exceeds the user's previous
    /// maximum in the same city, in ascending start-time order.
    ///
    /// "Previous" means an earlier `start_time`; activities sharing a start
    /// time are ordered by `strava_activity_id` so the window is stable.
    pub async fn coverage_increases(&self, user_id: i32) -> Result<Vec<CoverageIncrease>> {
        let rows = sqlx::query_as::<_, CoverageIncrease>(
            r#"
            SELECT
                a.user_id,
                a.strava_activity_id AS activity_id,
                a.city_id,
                c.name AS city_name,
                COALESCE(prev.max_coverage, 0) AS previous_coverage,
                a.coverage_percentage AS new_coverage,
                a.coverage_percentage - COALESCE(prev.max_coverage, 0) AS increase,
                a.sport_type,
                a.start_time
            FROM activities a
            JOIN cities c ON a.city_id = c.id
            LEFT JOIN LATERAL (
                SELECT MAX(a2.coverage_percentage) AS max_coverage
                FROM activities a2
                WHERE a2.user_id = a.user_id
                  AND a2.city_id = a.city_id
                  AND a2.coverage_percentage IS NOT NULL
                  AND (a2.start_time < a.start_time
                       OR (a2.start_time = a.start_time
                           AND a2.strava_activity_id < a.strava_activity_id))
            ) prev ON true
            WHERE a.user_id = $1
              AND a.coverage_percentage IS NOT NULL
              AND a.commented_at IS NULL
              AND a.coverage_percentage - COALESCE(prev.max_coverage, 0) > 0
            ORDER BY a.start_time ASC, a.strava_activity_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Persist a successful comment post. This is the at-most-once marker:
    /// it is written only after the provider accepted the comment.
    pub async fn mark_commented(&self, strava_activity_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE activities
            SET comment_posted = true, commented_at = now(), updated_at = now()
            WHERE strava_activity_id = $1
            "#,
        )
        .bind(strava_activity_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
