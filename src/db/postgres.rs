//! Postgres connection pool, schema migration and user/token operations.

use crate::error::{AppError, Result};
use crate::models::{StravaToken, User};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Embedded schema (applied at startup).
const SCHEMA: &str = include_str!("schema.sql");

/// Split the embedded schema into individual statements.
///
/// Postgres does not allow multiple statements in one prepared statement,
/// so each is executed separately. Comment-only fragments are dropped.
fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// Database handle wrapping the shared connection pool.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and apply the embedded schema.
    ///
    /// Pool sizing: 25 max open connections, 5 kept idle. Every write in
    /// this crate is a single statement; no long-lived transactions.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .connect(database_url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!("Connected to Postgres and applied schema");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in schema_statements(SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// The underlying pool, for the store modules in this crate.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get or create a user keyed by their Strava athlete ID.
    ///
    /// Idempotent: an existing user's name is refreshed only when the new
    /// name is non-empty and not the placeholder used when the athlete
    /// lookup failed.
    pub async fn get_or_create_user(&self, strava_id: i64, name: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (strava_id, name)
            VALUES ($1, $2)
            ON CONFLICT (strava_id) DO UPDATE SET
                name = CASE
                    WHEN EXCLUDED.name <> '' AND EXCLUDED.name <> 'Strava User'
                    THEN EXCLUDED.name
                    ELSE users.name
                END,
                updated_at = now()
            RETURNING id, strava_id, name, created_at, updated_at
            "#,
        )
        .bind(strava_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: i32) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, strava_id, name, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_strava_id(&self, strava_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, strava_id, name, created_at, updated_at FROM users WHERE strava_id = $1",
        )
        .bind(strava_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Replace the user's token row entirely.
    pub async fn upsert_token(
        &self,
        user_id: i32,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO strava_tokens (user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the user's token. `expires_at` is advisory: callers must be
    /// prepared for 401 responses regardless.
    pub async fn get_token(&self, user_id: i32) -> Result<StravaToken> {
        let token = sqlx::query_as::<_, StravaToken>(
            r#"
            SELECT id, user_id, access_token, refresh_token, expires_at, created_at, updated_at
            FROM strava_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        token.ok_or_else(|| AppError::NotFound(format!("no token for user {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_splits_into_statements() {
        let statements = schema_statements(SCHEMA);
        assert!(statements.len() > 10, "expected one statement per object");
        assert!(statements[0].contains("CREATE EXTENSION IF NOT EXISTS postgis"));
        // Comment-only fragments must not survive the split.
        for statement in &statements {
            assert!(statement
                .lines()
                .any(|l| !l.trim().is_empty() && !l.trim().starts_with("--")));
        }
    }

    #[test]
    fn test_schema_has_required_tables() {
        for table in [
            "users",
            "strava_tokens",
            "activities",
            "cities",
            "custom_areas",
            "import_status",
            "comment_settings",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "schema missing table {}",
                table
            );
        }
    }
}
