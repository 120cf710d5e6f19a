// SPDX-License-Identifier: MIT

//! User and OAuth token rows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A user, created on first authentication.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub strava_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Strava OAuth tokens, one row per user.
#[derive(Debug, Clone, FromRow)]
pub struct StravaToken {
    pub id: i32,
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
