// SPDX-License-Identifier: MIT

//! Coverage-Tracker: per-region street coverage from Strava activities.
//!
//! This crate ingests a user's Strava activities, attributes each activity
//! to geographic regions (cities and user-drawn custom areas) and computes
//! how much of each region the user has explored across all activities.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Db;
use services::{
    CommentService, CoverageService, CustomAreaService, ImportService, OnboardingService,
    RegionResolver, StravaClient,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub strava: StravaClient,
    pub importer: ImportService,
    pub resolver: RegionResolver,
    pub coverage: CoverageService,
    pub custom_areas: CustomAreaService,
    pub comments: CommentService,
    pub onboarding: OnboardingService,
}
