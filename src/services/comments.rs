// SPDX-License-Identifier: MIT

//! Delta notifier: posts a Strava comment when an activity raises the
//! user's coverage in a city.
//!
//! At-most-once discipline: `commented_at` is checked in the delta query
//! and written only after a successful post. A crash between the post and
//! the mark can produce a duplicate comment on retry; that is accepted.

use crate::db::Db;
use crate::error::Result;
use crate::services::strava::StravaClient;
use std::time::Duration;

/// Summary of one notifier run.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CommentRunSummary {
    pub detected: u32,
    pub posted: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Posts coverage-increase comments back to the provider.
#[derive(Clone)]
pub struct CommentService {
    db: Db,
    strava: StravaClient,
    post_delay: Duration,
}

impl CommentService {
    pub fn new(db: Db, strava: StravaClient) -> Self {
        Self {
            db,
            strava,
            post_delay: Duration::from_secs(2),
        }
    }

    /// Shrink the etiquette sleep between posts (tests).
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }

    /// Process all pending coverage-increase comments for a user.
    ///
    /// Activities are handled in ascending start-time order so the
    /// "previous maximum" window is well defined. Individual post failures
    /// are logged and counted, never fatal to the run.
    pub async fn process_pending(&self, user_id: i32) -> Result<CommentRunSummary> {
        let settings = self.db.get_comment_settings(user_id).await?;
        if !settings.enabled {
            tracing::debug!(user_id, "Auto-comments disabled, skipping");
            return Ok(CommentRunSummary::default());
        }

        let token = self.db.get_token(user_id).await?;
        let increases = self.db.coverage_increases(user_id).await?;

        let mut summary = CommentRunSummary {
            detected: increases.len() as u32,
            ..Default::default()
        };

        for increase in &increases {
            if !settings.allows_sport(&increase.sport_type)
                || increase.increase < settings.min_coverage_increase
            {
                summary.skipped += 1;
                continue;
            }

            let text = format_comment(
                &settings.comment_template,
                &increase.city_name,
                increase.new_coverage,
            );

            if let Err(e) = self
                .strava
                .post_comment(&token.access_token, increase.activity_id, &text)
                .await
            {
                tracing::warn!(
                    activity_id = increase.activity_id,
                    error = %e,
                    "Failed to post coverage comment"
                );
                summary.failed += 1;
                continue;
            }

            if let Err(e) = self.db.mark_commented(increase.activity_id).await {
                // The comment is live but unmarked; the next run may post a
                // duplicate. Accepted by the at-most-once contract.
                tracing::error!(
                    activity_id = increase.activity_id,
                    error = %e,
                    "Comment posted but failed to mark activity"
                );
            }
            summary.posted += 1;

            tokio::time::sleep(self.post_delay).await;
        }

        tracing::info!(
            user_id,
            detected = summary.detected,
            posted = summary.posted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Processed pending comments"
        );

        Ok(summary)
    }
}

/// Fill the user's comment template: `{city}` and `{coverage}` (one
/// decimal place).
pub fn format_comment(template: &str, city_name: &str, coverage: f64) -> String {
    template
        .replace("{city}", city_name)
        .replace("{coverage}", &format!("{:.1}", coverage))
}
