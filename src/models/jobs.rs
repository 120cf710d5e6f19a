// SPDX-License-Identifier: MIT

//! Job state: the persisted import job and the in-memory recalculation job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Import-job row, one per user. `current_page` is the recovery cursor for
/// resumable ingest; `in_progress` gates concurrent imports.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportStatus {
    pub user_id: i32,
    pub total_activities: i32,
    pub imported_count: i32,
    pub processed_count: i32,
    pub failed_count: i32,
    pub current_page: i32,
    pub in_progress: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub last_import_time: Option<DateTime<Utc>>,
    pub estimated_remaining: i32,
}

/// In-memory status of a bulk coverage recalculation. Not persisted; held
/// in the job registry for UI progress polling.
#[derive(Debug, Clone, Serialize)]
pub struct RecalculationStatus {
    pub job_id: String,
    /// "running", "completed" or "error"
    pub status: String,
    /// 0..100
    pub progress: i32,
    pub total: i32,
    pub updated: i32,
    pub errors: i32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl RecalculationStatus {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: "running".to_string(),
            progress: 0,
            total: 0,
            updated: 0,
            errors: 0,
            started_at: Utc::now(),
            finished_at: None,
            message: "Starting recalculation...".to_string(),
        }
    }
}
