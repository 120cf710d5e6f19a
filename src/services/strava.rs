//! Strava API client for fetching activities and posting comments.
//!
//! Handles:
//! - Paginated activity listing with rate-limit backoff
//! - Activity latlng stream fetches
//! - Athlete name lookup on login
//! - Comment posting (form-encoded, not idempotent)
//! - Token refresh

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Request timeout for all outbound Strava calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a rate-limited list call.
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    backoff_base: Duration,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
            backoff_base: Duration::from_secs(60),
        }
    }

    /// Point the client at a different API base (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Shrink the 429 backoff unit (tests).
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// List a page of the athlete's activities. The boolean is `has_more`:
    /// a full page means another page may exist.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<StravaActivitySummary>, bool)> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("activity list request failed: {}", e)))?;

        let activities: Vec<StravaActivitySummary> = self.check_response_json(response).await?;
        let has_more = activities.len() == per_page as usize;
        Ok((activities, has_more))
    }

    /// List a page of activities, retrying on 429 with exponential backoff
    /// (`2^attempt` backoff units, capped at three attempts). Exhaustion
    /// surfaces as `RateLimit` for the ingest loop to record.
    pub async fn list_activities_with_backoff(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<StravaActivitySummary>, bool)> {
        let mut attempt = 0;
        loop {
            match self.list_activities(access_token, page, per_page).await {
                Err(AppError::RateLimit(_)) => {
                    attempt += 1;
                    if attempt >= MAX_RATE_LIMIT_ATTEMPTS {
                        return Err(AppError::RateLimit(format!(
                            "rate limit exceeded after {} attempts on page {}",
                            MAX_RATE_LIMIT_ATTEMPTS, page
                        )));
                    }
                    let backoff = self.backoff_base * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        page,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        "Rate limited by Strava, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    /// Fetch the latlng stream of an activity as `[lat, lng]` pairs.
    ///
    /// The stream payload is parsed tolerantly: only well-formed coordinate
    /// pairs inside the `latlng` stream are kept.
    pub async fn get_latlng_stream(
        &self,
        access_token: &str,
        activity_id: i64,
    ) -> Result<Vec<[f64; 2]>> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("keys", "latlng")])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("stream request failed: {}", e)))?;

        let streams: Vec<serde_json::Value> = self.check_response_json(response).await?;
        Ok(extract_latlng(&streams))
    }

    /// Fetch the authenticated athlete's display name.
    pub async fn get_athlete_name(&self, access_token: &str) -> Result<String> {
        let url = format!("{}/athlete", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("athlete request failed: {}", e)))?;

        let athlete: StravaAthlete = self.check_response_json(response).await?;
        let name = format!("{} {}", athlete.firstname, athlete.lastname)
            .trim()
            .to_string();
        Ok(name)
    }

    /// Post a comment on an activity. Not idempotent at the provider:
    /// callers must check `comment_posted` first and mark after success.
    pub async fn post_comment(
        &self,
        access_token: &str,
        activity_id: i64,
        text: &str,
    ) -> Result<()> {
        let url = format!("{}/activities/{}/comments", self.base_url, activity_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .form(&[("text", text)])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("comment request failed: {}", e)))?;

        self.check_response(response).await
    }

    /// Exchange a refresh token for new credentials.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transient(format!("token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Classify a non-success response into the error taxonomy.
    async fn check_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }

    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Permanent(format!("Strava JSON parse error: {}", e)))
    }
}

/// HTTP status → error kind: 429 is retryable after a delay, other 4xx are
/// permanent, 5xx are transient.
fn classify_status(status: u16, body: &str) -> AppError {
    match status {
        429 => AppError::RateLimit("Strava rate limit (429)".to_string()),
        500..=599 => AppError::Transient(format!("Strava API error {}: {}", status, body)),
        _ => AppError::Permanent(format!("Strava API error {}: {}", status, body)),
    }
}

/// Pull `[lat, lng]` pairs out of a streams response, ignoring anything
/// malformed rather than failing the whole fetch.
fn extract_latlng(streams: &[serde_json::Value]) -> Vec<[f64; 2]> {
    let mut points = Vec::new();
    for stream in streams {
        if stream.get("type").and_then(|t| t.as_str()) != Some("latlng") {
            continue;
        }
        let Some(data) = stream.get("data").and_then(|d| d.as_array()) else {
            continue;
        };
        for point in data {
            if let Some(pair) = point.as_array() {
                if pair.len() == 2 {
                    if let (Some(lat), Some(lng)) = (pair[0].as_f64(), pair[1].as_f64()) {
                        points.push([lat, lng]);
                    }
                }
            }
        }
    }
    points
}

// ─── Wire Types ──────────────────────────────────────────────────

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Athlete profile, consumed only for the display name.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub sport_type: String,
    /// Metres
    #[serde(default)]
    pub distance: f64,
    /// Seconds
    #[serde(default)]
    pub moving_time: i32,
    /// Seconds
    #[serde(default)]
    pub elapsed_time: i32,
    /// Metres
    #[serde(default)]
    pub total_elevation_gain: f64,
    /// RFC 3339
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub timezone: Option<String>,
    /// `[lat, lng]` or empty for indoor activities
    #[serde(default)]
    pub start_latlng: Vec<f64>,
    #[serde(default)]
    pub end_latlng: Vec<f64>,
    #[serde(default)]
    pub map: StravaMap,
}

/// Activity map data with the summary polyline.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaMap {
    #[serde(default)]
    pub summary_polyline: String,
}

impl StravaActivitySummary {
    pub fn start_coords(&self) -> Option<(f64, f64)> {
        if self.start_latlng.len() == 2 {
            Some((self.start_latlng[0], self.start_latlng[1]))
        } else {
            None
        }
    }

    pub fn end_coords(&self) -> Option<(f64, f64)> {
        if self.end_latlng.len() == 2 {
            Some((self.end_latlng[0], self.end_latlng[1]))
        } else {
            None
        }
    }

    pub fn summary_polyline(&self) -> Option<&str> {
        if self.map.summary_polyline.is_empty() {
            None
        } else {
            Some(&self.map.summary_polyline)
        }
    }
}
