// SPDX-License-Identifier: MIT

//! Ingest pipeline: paginated, resumable pull of a user's activity history.
//!
//! Two modes share one loop:
//! - *Summary* (login flow, 25/page): inserts from list-page fields only;
//!   paths are synthesised later from the encoded polyline or coordinates.
//! - *Stream* (explicit backfill, 100/page): additionally fetches each
//!   activity's latlng stream and stores a full linestring.
//!
//! The `import_status` row is the only job state: `in_progress` gates
//! concurrent runs and `current_page` is the recovery cursor after a
//! rate-limit abort.

use crate::db::activities::linestring_wkt;
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::activity::{is_importable_sport, NewActivity};
use crate::services::strava::{StravaActivitySummary, StravaClient};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Hard safety cap on pages per run.
const MAX_PAGES: i32 = 1000;

/// Page size and per-activity behaviour of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// List-page fields only; cheap on the rate limit.
    Summary,
    /// One extra stream fetch per activity; reserved for backfill.
    Stream,
}

impl ImportMode {
    fn per_page(self) -> u32 {
        match self {
            ImportMode::Summary => 25,
            ImportMode::Stream => 100,
        }
    }
}

/// Counters reported by a finished run.
#[derive(Debug, Clone, Copy)]
pub struct ImportOutcome {
    pub imported: i32,
    pub failed: i32,
    /// False when the run ended early on rate-limit exhaustion.
    pub completed: bool,
}

/// Resumable activity importer.
#[derive(Clone)]
pub struct ImportService {
    db: Db,
    strava: StravaClient,
    page_delay: Duration,
    item_delay: Duration,
}

impl ImportService {
    pub fn new(db: Db, strava: StravaClient) -> Self {
        Self {
            db,
            strava,
            page_delay: Duration::from_secs(5),
            item_delay: Duration::from_millis(100),
        }
    }

    /// Shrink the etiquette sleeps (tests).
    pub fn with_delays(mut self, page_delay: Duration, item_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self.item_delay = item_delay;
        self
    }

    /// Claim the user's import slot and run the import in the background.
    /// Fails with `Conflict` when an import is already in progress, so the
    /// caller can report 409 before anything is spawned.
    pub async fn start(&self, user_id: i32, mode: ImportMode) -> Result<()> {
        if self.db.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("no user with ID {}", user_id)));
        }

        let Some(start_page) = self.db.begin_import(user_id).await? else {
            return Err(AppError::Conflict(format!(
                "import already in progress for user {}",
                user_id
            )));
        };

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.run_claimed(user_id, mode, start_page).await {
                tracing::error!(user_id, error = %e, kind = e.kind(), "Import run failed");
            }
        });

        Ok(())
    }

    /// Claim the slot and run to completion on the caller's task (used by
    /// the onboarding pipeline, which sequences import before resolution).
    pub async fn run(&self, user_id: i32, mode: ImportMode) -> Result<ImportOutcome> {
        let Some(start_page) = self.db.begin_import(user_id).await? else {
            return Err(AppError::Conflict(format!(
                "import already in progress for user {}",
                user_id
            )));
        };
        self.run_claimed(user_id, mode, start_page).await
    }

    async fn run_claimed(
        &self,
        user_id: i32,
        mode: ImportMode,
        start_page: i32,
    ) -> Result<ImportOutcome> {
        let token = match self.db.get_token(user_id).await {
            Ok(token) => token,
            Err(e) => {
                self.db
                    .finish_import(user_id, 0, 0, Some("no Strava token stored"))
                    .await
                    .ok();
                return Err(e);
            }
        };

        let per_page = mode.per_page();
        let mut page = start_page.max(1);
        let mut imported = 0;
        let mut failed = 0;

        tracing::info!(user_id, ?mode, page, "Starting activity import");

        loop {
            let (batch, has_more) = match self
                .strava
                .list_activities_with_backoff(&token.access_token, page as u32, per_page)
                .await
            {
                Ok(result) => result,
                Err(AppError::RateLimit(msg)) => {
                    return self
                        .end_rate_limited(user_id, page, imported, failed, &msg)
                        .await;
                }
                Err(e) => {
                    self.db
                        .finish_import(
                            user_id,
                            imported,
                            failed,
                            Some(&format!("import failed on page {}: {}", page, e)),
                        )
                        .await
                        .ok();
                    return Err(e);
                }
            };

            if batch.is_empty() {
                break;
            }

            for summary in &batch {
                if !qualifies_for_import(summary) {
                    continue;
                }

                match self
                    .import_one(user_id, summary, &token.access_token, mode)
                    .await
                {
                    Ok(true) => imported += 1,
                    Ok(false) => {
                        tracing::debug!(activity_id = summary.id, "Skipping duplicate activity");
                    }
                    Err(AppError::RateLimit(msg)) => {
                        return self
                            .end_rate_limited(user_id, page, imported, failed, &msg)
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            activity_id = summary.id,
                            error = %e,
                            "Failed to import activity"
                        );
                        failed += 1;
                    }
                }

                tokio::time::sleep(self.item_delay).await;
            }

            if let Err(e) = self
                .db
                .update_import_progress(user_id, page, imported, failed)
                .await
            {
                // Release the slot even when the progress write fails, so
                // the in_progress gate cannot wedge shut.
                self.db
                    .finish_import(
                        user_id,
                        imported,
                        failed,
                        Some(&format!("import failed on page {}: {}", page, e)),
                    )
                    .await
                    .ok();
                return Err(e);
            }

            if !has_more {
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                tracing::warn!(user_id, "Stopping import: reached page limit");
                break;
            }

            tokio::time::sleep(self.page_delay).await;
        }

        self.db.finish_import(user_id, imported, failed, None).await?;
        tracing::info!(user_id, imported, failed, "Import completed");

        Ok(ImportOutcome {
            imported,
            failed,
            completed: true,
        })
    }

    /// Rate-limit exhaustion ends the run gracefully: the failing page stays
    /// in `current_page` as the recovery point and the message is recorded.
    async fn end_rate_limited(
        &self,
        user_id: i32,
        page: i32,
        imported: i32,
        failed: i32,
        message: &str,
    ) -> Result<ImportOutcome> {
        tracing::warn!(user_id, page, message, "Import stopped by rate limit");
        self.db
            .update_import_progress(user_id, page, imported, failed)
            .await
            .ok();
        self.db
            .finish_import(user_id, imported, failed, Some(message))
            .await?;
        Ok(ImportOutcome {
            imported,
            failed,
            completed: false,
        })
    }

    /// Insert one activity. Returns `Ok(false)` for a duplicate.
    async fn import_one(
        &self,
        user_id: i32,
        summary: &StravaActivitySummary,
        access_token: &str,
        mode: ImportMode,
    ) -> Result<bool> {
        let path_wkt = match mode {
            ImportMode::Summary => None,
            ImportMode::Stream => {
                let latlng = self.strava.get_latlng_stream(access_token, summary.id).await?;
                linestring_wkt(latlng.iter().map(|p| (p[1], p[0])))
            }
        };

        let activity = new_activity(user_id, summary, path_wkt)?;
        self.db.insert_activity(&activity).await
    }
}

/// Qualification filter: the activity must carry some GPS handle (start
/// coordinates or an encoded polyline) and be of an importable sport type.
pub fn qualifies_for_import(summary: &StravaActivitySummary) -> bool {
    let has_gps = summary.start_coords().is_some() || summary.summary_polyline().is_some();
    has_gps && is_importable_sport(&summary.activity_type, &summary.sport_type)
}

/// Map a wire summary onto an activity row.
fn new_activity(
    user_id: i32,
    summary: &StravaActivitySummary,
    path_wkt: Option<String>,
) -> Result<NewActivity> {
    let start_time = parse_start_date(&summary.start_date)?;
    let (start_latitude, start_longitude) = match summary.start_coords() {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    let (end_latitude, end_longitude) = match summary.end_coords() {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };

    Ok(NewActivity {
        user_id,
        strava_activity_id: summary.id,
        name: summary.name.clone(),
        activity_type: summary.activity_type.clone(),
        sport_type: if summary.sport_type.is_empty() {
            summary.activity_type.clone()
        } else {
            summary.sport_type.clone()
        },
        distance_km: summary.distance / 1000.0,
        moving_time_s: summary.moving_time,
        elapsed_time_s: summary.elapsed_time,
        elevation_gain_m: summary.total_elevation_gain,
        start_time,
        timezone: summary.timezone.clone(),
        polyline: summary.summary_polyline().map(str::to_string),
        start_latitude,
        start_longitude,
        end_latitude,
        end_longitude,
        path_wkt,
    })
}

fn parse_start_date(raw: &str) -> Result<Option<DateTime<Utc>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| AppError::Permanent(format!("invalid start_date '{}': {}", raw, e)))
}
