// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod activity;
pub mod city;
pub mod custom_area;
pub mod jobs;
pub mod settings;
pub mod user;

pub use activity::{ActivityCoverageRow, AttributedActivity, CoverageIncrease, NewActivity};
pub use city::{ActivityCluster, City, CityIntersection};
pub use custom_area::{CustomArea, GridCoverage};
pub use jobs::{ImportStatus, RecalculationStatus};
pub use settings::CommentSettings;
pub use user::{StravaToken, User};
