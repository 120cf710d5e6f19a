//! Import-job state: the persisted recovery point for the ingest pipeline.
//!
//! Exactly one row per user. `in_progress = true` gates concurrent imports;
//! `current_page` is the resumption cursor after a rate-limit abort.

use crate::db::Db;
use crate::error::Result;
use crate::models::jobs::ImportStatus;

impl Db {
    pub async fn get_import_status(&self, user_id: i32) -> Result<Option<ImportStatus>> {
        let status = sqlx::query_as::<_, ImportStatus>(
            r#"
            SELECT user_id, total_activities, imported_count, processed_count, failed_count,
                   current_page, in_progress, started_at, completed_at, error_message,
                   last_import_time, estimated_remaining
            FROM import_status
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(status)
    }

    /// Claim the import slot for a user. Returns the page to start from, or
    /// `None` if an import is already running (the caller reports Conflict).
    ///
    /// A previous run that ended with an `error_message` keeps its
    /// `current_page` as the recovery point; a cleanly completed run starts
    /// over from page 1.
    pub async fn begin_import(&self, user_id: i32) -> Result<Option<i32>> {
        let page: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO import_status (user_id, in_progress, started_at, current_page)
            VALUES ($1, true, now(), 1)
            ON CONFLICT (user_id) DO UPDATE SET
                in_progress = true,
                started_at = now(),
                current_page = CASE
                    WHEN import_status.error_message IS NOT NULL THEN import_status.current_page
                    ELSE 1
                END,
                imported_count = CASE
                    WHEN import_status.error_message IS NOT NULL THEN import_status.imported_count
                    ELSE 0
                END,
                failed_count = CASE
                    WHEN import_status.error_message IS NOT NULL THEN import_status.failed_count
                    ELSE 0
                END,
                completed_at = NULL,
                error_message = NULL,
                updated_at = now()
            WHERE import_status.in_progress = false
            RETURNING current_page
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(page)
    }

    /// Persist page-granular progress so a separate handler can report it
    /// without touching in-memory state.
    pub async fn update_import_progress(
        &self,
        user_id: i32,
        current_page: i32,
        imported: i32,
        failed: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE import_status
            SET current_page = $2,
                imported_count = $3,
                failed_count = $4,
                last_import_time = now(),
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(current_page)
        .bind(imported)
        .bind(failed)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Release the import slot. An `error_message` marks a run that ended
    /// early (rate-limit exhaustion or a hard failure); the page cursor is
    /// left untouched so the next run resumes from it.
    pub async fn finish_import(
        &self,
        user_id: i32,
        imported: i32,
        failed: i32,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE import_status
            SET imported_count = $2,
                failed_count = $3,
                in_progress = false,
                completed_at = now(),
                error_message = $4,
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(imported)
        .bind(failed)
        .bind(error_message)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
