// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod comments;
pub mod coverage;
pub mod custom_areas;
pub mod geocoder;
pub mod importer;
pub mod onboarding;
pub mod resolver;
pub mod seed;
pub mod strava;

pub use comments::CommentService;
pub use coverage::CoverageService;
pub use custom_areas::CustomAreaService;
pub use geocoder::Geocoder;
pub use importer::{ImportMode, ImportService};
pub use onboarding::{AuthenticatedUser, OnboardingService};
pub use resolver::RegionResolver;
pub use strava::StravaClient;
