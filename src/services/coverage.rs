// SPDX-License-Identifier: MIT

//! Coverage engine: city coverage, activity-scoped calculation and bulk
//! recalculation with observable progress.
//!
//! City coverage is an area-normalised distance ratio. No street network is
//! consumed; the explorable distance is estimated from the city's area with
//! density tiers, so the metric is deliberately coarse.

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::jobs::RecalculationStatus;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Progress is pushed to the job registry every this many activities.
const PROGRESS_EVERY: usize = 5;

/// Estimated explorable distance (km) inside a city of the given area.
///
/// Denser small cities pack more street per km²; the factor steps down with
/// size. A degenerate zero-area city has nothing explorable.
pub fn explorable_km(area_km2: f64) -> f64 {
    if area_km2 <= 0.0 {
        return 0.0;
    }
    let factor = if area_km2 < 50.0 {
        80.0
    } else if area_km2 < 200.0 {
        60.0
    } else if area_km2 < 500.0 {
        40.0
    } else {
        30.0
    };
    area_km2 * factor
}

/// Coverage percentage for a user-city pair, capped at 100. A city with no
/// explorable distance reports 0, never NaN.
pub fn city_coverage_percent(covered_km: f64, area_km2: f64) -> f64 {
    let explorable = explorable_km(area_km2);
    if explorable <= 0.0 {
        return 0.0;
    }
    ((covered_km / explorable) * 100.0).min(100.0)
}

/// Result of an activity-scoped coverage calculation.
///
/// `new_streets_km` is retained for forward compatibility and reported as
/// zero: the distance model does not compute per-activity novelty.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageResult {
    pub activity_id: i64,
    pub city_id: i32,
    pub city_name: String,
    pub coverage_percent: f64,
    pub new_streets_km: f64,
    pub total_streets_km: f64,
    pub covered_km: f64,
}

/// A user's aggregate coverage in one city.
#[derive(Debug, Clone, Serialize)]
pub struct UserCityCoverage {
    pub user_id: i32,
    pub city_id: i32,
    pub city_name: String,
    pub coverage_percent: f64,
    pub total_streets_km: f64,
    pub covered_streets_km: f64,
}

/// Coverage calculation service with the in-process recalculation registry.
#[derive(Clone)]
pub struct CoverageService {
    db: Db,
    jobs: Arc<DashMap<String, RecalculationStatus>>,
}

impl CoverageService {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            jobs: Arc::new(DashMap::new()),
        }
    }

    // ─── Activity-Scoped Calculation ─────────────────────────────

    /// Calculate coverage for one activity: pick the city with the longest
    /// path intersection, compute the user's aggregate coverage there and
    /// write both onto the activity row.
    pub async fn calculate_activity_coverage(
        &self,
        strava_activity_id: i64,
    ) -> Result<CoverageResult> {
        let user_id = self.db.activity_owner(strava_activity_id).await?;

        let intersections = self.db.intersecting_cities(strava_activity_id).await?;
        let Some(primary) = intersections.first() else {
            return Err(AppError::NotFound(format!(
                "activity {} does not intersect any tracked city",
                strava_activity_id
            )));
        };

        let result = self
            .coverage_for_known_city(user_id, strava_activity_id, primary.city_id, &primary.city_name)
            .await?;

        self.db
            .update_activity_coverage(strava_activity_id, result.city_id, result.coverage_percent)
            .await?;

        tracing::info!(
            activity_id = strava_activity_id,
            city = %result.city_name,
            coverage = result.coverage_percent,
            "Calculated activity coverage"
        );

        Ok(result)
    }

    /// Compute coverage for an activity whose city is already known (the
    /// bulk-recalculation path, which skips intersection re-ranking).
    async fn coverage_for_known_city(
        &self,
        user_id: i32,
        strava_activity_id: i64,
        city_id: i32,
        city_name: &str,
    ) -> Result<CoverageResult> {
        let area_km2 = self.db.city_area_km2(city_id).await?;
        let covered_km = self.db.user_distance_km_in_city(user_id, city_id).await?;

        Ok(CoverageResult {
            activity_id: strava_activity_id,
            city_id,
            city_name: city_name.to_string(),
            coverage_percent: city_coverage_percent(covered_km, area_km2),
            new_streets_km: 0.0,
            total_streets_km: explorable_km(area_km2),
            covered_km,
        })
    }

    /// Aggregate coverage of a user in a city, for the read endpoint.
    pub async fn user_city_coverage(
        &self,
        user_id: i32,
        city_id: i32,
    ) -> Result<UserCityCoverage> {
        let city = self.db.get_city(city_id).await?;
        let covered_km = self.db.user_distance_km_in_city(user_id, city_id).await?;

        Ok(UserCityCoverage {
            user_id,
            city_id,
            city_name: city.name,
            coverage_percent: city_coverage_percent(covered_km, city.area_km2),
            total_streets_km: explorable_km(city.area_km2),
            covered_streets_km: covered_km,
        })
    }

    /// Recompute and persist coverage for all of one user's attributed
    /// activities (the onboarding pipeline's final step).
    pub async fn recalculate_user(&self, user_id: i32) -> Result<u32> {
        let activities = self.db.attributed_activities_for_user(user_id).await?;
        let mut updated = 0u32;

        for activity in &activities {
            match self
                .coverage_for_known_city(
                    activity.user_id,
                    activity.strava_activity_id,
                    activity.city_id,
                    &activity.city_name,
                )
                .await
            {
                Ok(result) => {
                    self.db
                        .update_coverage_percentage(
                            activity.strava_activity_id,
                            result.coverage_percent,
                        )
                        .await?;
                    updated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        activity_id = activity.strava_activity_id,
                        error = %e,
                        "Failed to recalculate activity coverage"
                    );
                }
            }
        }

        Ok(updated)
    }

    // ─── Bulk Recalculation ──────────────────────────────────────

    /// Create a recalculation job and run it in the background. Returns the
    /// job id immediately; progress is observable via the registry.
    pub fn start_recalculate_all(&self) -> String {
        let job_id = format!("recalc_{}", uuid::Uuid::new_v4().simple());
        self.jobs
            .insert(job_id.clone(), RecalculationStatus::new(job_id.clone()));

        let service = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            service.perform_recalculation(&id).await;
        });

        job_id
    }

    /// Snapshot of a job's status.
    pub fn recalculation_status(&self, job_id: &str) -> Option<RecalculationStatus> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    async fn perform_recalculation(&self, job_id: &str) {
        let activities = match self.db.attributed_activities().await {
            Ok(activities) => activities,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Recalculation failed to fetch activities");
                self.update_job(job_id, |job| {
                    job.status = "error".to_string();
                    job.finished_at = Some(Utc::now());
                    job.message = "Failed to fetch activities".to_string();
                });
                return;
            }
        };

        let total = activities.len();
        self.update_job(job_id, |job| {
            job.total = total as i32;
            job.message = format!("Processing {} activities", total);
        });

        let mut updated = 0;
        let mut errors = 0;

        for (i, activity) in activities.iter().enumerate() {
            let result = self
                .coverage_for_known_city(
                    activity.user_id,
                    activity.strava_activity_id,
                    activity.city_id,
                    &activity.city_name,
                )
                .await;

            match result {
                Ok(coverage) => {
                    match self
                        .db
                        .update_coverage_percentage(
                            activity.strava_activity_id,
                            coverage.coverage_percent,
                        )
                        .await
                    {
                        Ok(()) => updated += 1,
                        Err(e) => {
                            tracing::warn!(
                                activity_id = activity.strava_activity_id,
                                error = %e,
                                "Recalculation write failed"
                            );
                            errors += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        activity_id = activity.strava_activity_id,
                        error = %e,
                        "Recalculation failed for activity"
                    );
                    errors += 1;
                }
            }

            if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == total {
                let progress = (((i + 1) * 100) / total) as i32;
                let message = format!(
                    "Processed {}/{} activities (updated: {}, errors: {})",
                    i + 1,
                    total,
                    updated,
                    errors
                );
                self.update_job(job_id, |job| {
                    job.progress = progress;
                    job.updated = updated;
                    job.errors = errors;
                    job.message = message.clone();
                });
            }
        }

        self.update_job(job_id, |job| {
            job.status = "completed".to_string();
            job.progress = 100;
            job.updated = updated;
            job.errors = errors;
            job.finished_at = Some(Utc::now());
            job.message = format!(
                "Recalculation complete: {} updated, {} errors",
                updated, errors
            );
        });

        tracing::info!(job_id, total, updated, errors, "Recalculation complete");
    }

    fn update_job<F: FnOnce(&mut RecalculationStatus)>(&self, job_id: &str, mutate: F) {
        if let Some(mut entry) = self.jobs.get_mut(job_id) {
            mutate(entry.value_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explorable_km_tiers() {
        assert_eq!(explorable_km(10.0), 800.0);
        assert_eq!(explorable_km(100.0), 6000.0);
        assert_eq!(explorable_km(300.0), 12000.0);
        assert_eq!(explorable_km(1000.0), 30000.0);
    }

    #[test]
    fn test_explorable_km_tier_boundaries() {
        assert_eq!(explorable_km(50.0), 3000.0);
        assert_eq!(explorable_km(200.0), 8000.0);
        assert_eq!(explorable_km(500.0), 15000.0);
    }

    #[test]
    fn test_city_coverage_basic() {
        // 100 km² city → 6000 explorable km; 60 km covered → 1.0%
        let pct = city_coverage_percent(60.0, 100.0);
        assert!((pct - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_city_coverage_cap() {
        // 12000 km in a 6000 km city engages the cap.
        assert_eq!(city_coverage_percent(12_000.0, 100.0), 100.0);
    }

    #[test]
    fn test_degenerate_city_reports_zero() {
        let pct = city_coverage_percent(42.0, 0.0);
        assert_eq!(pct, 0.0);
        assert!(!pct.is_nan());
    }
}
