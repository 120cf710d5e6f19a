// SPDX-License-Identifier: MIT

//! Per-user auto-comment preferences.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Comment settings, one row per user. When no row exists the default is
/// returned synthetically (comments off, all sports on).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommentSettings {
    pub user_id: i32,
    pub enabled: bool,
    pub running_enabled: bool,
    pub cycling_enabled: bool,
    pub walking_enabled: bool,
    pub hiking_enabled: bool,
    pub ebiking_enabled: bool,
    pub skiing_enabled: bool,
    pub comment_template: String,
    pub min_coverage_increase: f64,
    pub custom_areas_enabled: bool,
}

impl CommentSettings {
    pub fn default_for(user_id: i32) -> Self {
        Self {
            user_id,
            enabled: false,
            running_enabled: true,
            cycling_enabled: true,
            walking_enabled: true,
            hiking_enabled: true,
            ebiking_enabled: true,
            skiing_enabled: true,
            comment_template: "Your coverage of {city} is {coverage}%!".to_string(),
            min_coverage_increase: 0.1,
            custom_areas_enabled: false,
        }
    }

    /// Per-sport switch. Unlisted sport types default to enabled.
    pub fn allows_sport(&self, sport_type: &str) -> bool {
        match sport_type {
            "Run" | "TrailRun" | "VirtualRun" => self.running_enabled,
            "Ride" | "VirtualRide" => self.cycling_enabled,
            "Walk" => self.walking_enabled,
            "Hike" => self.hiking_enabled,
            "EBikeRide" => self.ebiking_enabled,
            "AlpineSki" | "BackcountrySki" | "NordicSki" => self.skiing_enabled,
            _ => true,
        }
    }
}
