// SPDX-License-Identifier: MIT

//! Onboarding: consume an authentication event and run the login pipeline.
//!
//! The OAuth handshake itself lives in an external collaborator; it hands
//! this service the athlete identity and tokens. The pipeline then runs in
//! the background: import (skipped when the user already has activities),
//! region resolution, then per-city coverage.

use crate::db::Db;
use crate::error::Result;
use crate::models::user::User;
use crate::services::coverage::CoverageService;
use crate::services::importer::{ImportMode, ImportService};
use crate::services::resolver::RegionResolver;
use crate::services::strava::StravaClient;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Payload delivered by the auth collaborator after a token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub strava_id: i64,
    #[serde(default)]
    pub display_name: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct OnboardingService {
    db: Db,
    strava: StravaClient,
    importer: ImportService,
    resolver: RegionResolver,
    coverage: CoverageService,
}

impl OnboardingService {
    pub fn new(
        db: Db,
        strava: StravaClient,
        importer: ImportService,
        resolver: RegionResolver,
        coverage: CoverageService,
    ) -> Self {
        Self {
            db,
            strava,
            importer,
            resolver,
            coverage,
        }
    }

    /// Persist the user and tokens, then spawn the processing pipeline.
    /// Returns the user immediately; the pipeline reports through logs and
    /// the import-status row.
    pub async fn complete_authentication(&self, auth: AuthenticatedUser) -> Result<User> {
        // When the auth collaborator has no display name, ask the provider;
        // fall back to the placeholder that never overwrites a stored name.
        let display_name = if auth.display_name.is_empty() {
            match self.strava.get_athlete_name(&auth.access_token).await {
                Ok(name) if !name.is_empty() => name,
                Ok(_) => "Strava User".to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Athlete lookup failed, using placeholder name");
                    "Strava User".to_string()
                }
            }
        } else {
            auth.display_name.clone()
        };

        let user = self
            .db
            .get_or_create_user(auth.strava_id, &display_name)
            .await?;

        let expires_at: DateTime<Utc> = DateTime::from_timestamp(auth.expires_at, 0)
            .unwrap_or_else(Utc::now);
        self.db
            .upsert_token(user.id, &auth.access_token, &auth.refresh_token, expires_at)
            .await?;

        let service = self.clone();
        let user_id = user.id;
        tokio::spawn(async move {
            if let Err(e) = service.process_user(user_id).await {
                tracing::error!(user_id, error = %e, kind = e.kind(), "Login processing failed");
            }
        });

        Ok(user)
    }

    /// The login pipeline: import → resolve → coverage.
    pub async fn process_user(&self, user_id: i32) -> Result<()> {
        tracing::info!(user_id, "Starting login processing");

        if self.db.count_activities(user_id).await? == 0 {
            self.importer.run(user_id, ImportMode::Summary).await?;
        } else {
            tracing::info!(user_id, "User already has activities, skipping import");
        }

        self.resolver.resolve_user(user_id).await?;

        let updated = self.coverage.recalculate_user(user_id).await?;
        tracing::info!(user_id, updated, "Login processing complete");

        Ok(())
    }
}
