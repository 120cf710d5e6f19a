//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup and passed explicitly into each service
//! constructor; there is no process-wide mutable configuration.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Redirect URI registered with Strava
    pub strava_redirect_uri: String,
    /// Postgres connection URL (database must allow `CREATE EXTENSION postgis`)
    pub database_url: String,
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Optional GeoJSON file with seed city boundaries
    pub city_seed_path: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            database_url: "postgres://localhost/coverage_test".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            city_seed_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honoured for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_redirect_uri: env::var("STRAVA_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("STRAVA_REDIRECT_URI"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            city_seed_path: env::var("CITY_SEED_PATH").ok(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", "test_secret");
        env::set_var("STRAVA_REDIRECT_URI", "http://localhost/cb");
        env::set_var("DATABASE_URL", "postgres://localhost/coverage");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.port, 8080);
    }
}
