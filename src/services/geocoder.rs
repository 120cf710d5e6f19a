//! Reverse geocoding of cluster centres with an offline fallback.

use serde::Deserialize;
use std::time::Duration;

/// Identifying User-Agent required by the Nominatim usage policy.
const USER_AGENT: &str = "coverage-tracker/0.3 (ops@coverage-tracker.dev)";

/// Reverse geocoder backed by Nominatim.
///
/// Never fails: any network error, non-200 or empty result falls back to a
/// coarse coordinate classifier so city discovery can proceed offline.
#[derive(Clone)]
pub struct Geocoder {
    http: reqwest::Client,
    base_url: String,
}

impl Default for Geocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Geocoder {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
            base_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }

    /// Point the geocoder at a different endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Resolve `(lat, lng)` to `(city_name, country_code)`.
    ///
    /// The name is the first populated of city/town/village/county/state;
    /// the country code is uppercased ISO-2, `"XX"` when unknown.
    pub async fn reverse(&self, lat: f64, lng: f64) -> (String, String) {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&zoom=12&addressdetails=1",
            self.base_url, lat, lng
        );

        let response = match self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(lat, lng, status = %resp.status(), "Reverse geocoding failed");
                return fallback_city_name(lat, lng);
            }
            Err(e) => {
                tracing::warn!(lat, lng, error = %e, "Reverse geocoding request failed");
                return fallback_city_name(lat, lng);
            }
        };

        let parsed: NominatimResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(lat, lng, error = %e, "Reverse geocoding parse failed");
                return fallback_city_name(lat, lng);
            }
        };

        let Some(name) = parsed.address.best_name() else {
            tracing::warn!(lat, lng, "Reverse geocoding returned no usable name");
            return fallback_city_name(lat, lng);
        };

        let country = parsed
            .address
            .country_code
            .filter(|cc| !cc.is_empty())
            .map(|cc| cc.to_uppercase())
            .unwrap_or_else(|| "XX".to_string());

        tracing::debug!(lat, lng, name = %name, country = %country, "Reverse geocoded cluster");
        (name, country)
    }
}

/// Nominatim reverse response; every field optional by design, the caller
/// picks the first populated name.
#[derive(Debug, Default, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country_code: Option<String>,
}

impl NominatimAddress {
    fn best_name(&self) -> Option<String> {
        [
            &self.city,
            &self.town,
            &self.village,
            &self.county,
            &self.state,
        ]
        .into_iter()
        .flatten()
        .find(|name| !name.is_empty())
        .cloned()
    }
}

/// Offline fallback: coarse bounding-box classification for when the
/// geocoder is unreachable.
pub fn fallback_city_name(lat: f64, lng: f64) -> (String, String) {
    if (49.0..=61.0).contains(&lat) && (-8.0..=2.0).contains(&lng) {
        if (52.7..=52.8).contains(&lat) && (-1.3..=-1.1).contains(&lng) {
            return ("Loughborough".to_string(), "GB".to_string());
        }
        if (52.4..=52.6).contains(&lat) && (-1.3..=-1.0).contains(&lng) {
            return ("Leicester".to_string(), "GB".to_string());
        }
        if (53.35..=53.45).contains(&lat) && (-1.6..=-1.3).contains(&lng) {
            return ("Sheffield".to_string(), "GB".to_string());
        }
        if (51.45..=51.55).contains(&lat) && (-0.2..=0.1).contains(&lng) {
            return ("London".to_string(), "GB".to_string());
        }
        return (format!("UK_City_{:.2}_{:.2}", lat, lng), "GB".to_string());
    }
    if (45.0..=51.0).contains(&lat) && (-5.0..=8.0).contains(&lng) {
        return (format!("France_{:.2}_{:.2}", lat, lng), "FR".to_string());
    }
    if (25.0..=49.0).contains(&lat) && (-125.0..=-66.0).contains(&lng) {
        return (format!("US_City_{:.2}_{:.2}", lat, lng), "US".to_string());
    }
    (format!("Area_{:.2}_{:.2}", lat, lng), "XX".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_known_uk_cities() {
        assert_eq!(
            fallback_city_name(52.77, -1.22),
            ("Loughborough".to_string(), "GB".to_string())
        );
        assert_eq!(
            fallback_city_name(51.5, 0.0),
            ("London".to_string(), "GB".to_string())
        );
        assert_eq!(
            fallback_city_name(53.4, -1.45),
            ("Sheffield".to_string(), "GB".to_string())
        );
    }

    #[test]
    fn test_fallback_coarse_boxes() {
        let (name, cc) = fallback_city_name(55.9, -3.2);
        assert!(name.starts_with("UK_City_"));
        assert_eq!(cc, "GB");

        let (name, cc) = fallback_city_name(48.85, 2.35);
        assert!(name.starts_with("France_"));
        assert_eq!(cc, "FR");

        let (name, cc) = fallback_city_name(40.7, -74.0);
        assert!(name.starts_with("US_City_"));
        assert_eq!(cc, "US");
    }

    #[test]
    fn test_fallback_unknown_area() {
        let (name, cc) = fallback_city_name(-33.86, 151.2);
        assert_eq!(name, "Area_-33.86_151.20");
        assert_eq!(cc, "XX");
    }

    #[test]
    fn test_best_name_ordering() {
        let address = NominatimAddress {
            city: None,
            town: Some("".to_string()),
            village: Some("Quorn".to_string()),
            county: Some("Leicestershire".to_string()),
            state: None,
            country_code: Some("gb".to_string()),
        };
        assert_eq!(address.best_name(), Some("Quorn".to_string()));
    }
}
