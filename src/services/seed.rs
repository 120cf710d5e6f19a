// SPDX-License-Identifier: MIT

//! Seed city boundaries from a GeoJSON file at startup.
//!
//! Features must carry `name` and `country_code` properties and a Polygon
//! or MultiPolygon geometry. Existing cities (matched on name + country)
//! get their boundary refreshed; seeding is idempotent.

use crate::db::Db;
use crate::error::{AppError, Result};
use geo::{MultiPolygon, Polygon};
use geojson::GeoJson;
use std::fs;
use std::path::Path;

pub async fn seed_cities_from_file<P: AsRef<Path>>(db: &Db, path: P) -> Result<usize> {
    let json_data = fs::read_to_string(path.as_ref())
        .map_err(|e| AppError::Invalid(format!("failed to read seed file: {}", e)))?;
    seed_cities_from_json(db, &json_data).await
}

pub async fn seed_cities_from_json(db: &Db, json_data: &str) -> Result<usize> {
    let geojson: GeoJson = json_data
        .parse()
        .map_err(|e: geojson::Error| AppError::Invalid(format!("invalid seed GeoJSON: {}", e)))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(AppError::Invalid(
            "seed file must be a GeoJSON FeatureCollection".to_string(),
        ));
    };

    let mut seeded = 0;
    for feature in collection.features {
        let name = feature
            .property("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if name.is_empty() {
            tracing::warn!("Skipping seed feature without a name property");
            continue;
        }

        let country_code = feature
            .property("country_code")
            .and_then(|v| v.as_str())
            .unwrap_or("XX")
            .to_uppercase();

        let Some(geometry) = feature.geometry else {
            tracing::warn!(name = %name, "Skipping seed feature without geometry");
            continue;
        };

        let wkt = match boundary_wkt(geometry.value) {
            Ok(wkt) => wkt,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Skipping seed feature");
                continue;
            }
        };

        db.upsert_city_boundary(&name, &country_code, &wkt).await?;
        seeded += 1;
    }

    tracing::info!(count = seeded, "Seeded city boundaries");
    Ok(seeded)
}

/// Convert a GeoJSON geometry to WKT, accepting Polygon or MultiPolygon.
fn boundary_wkt(value: geojson::Value) -> Result<String> {
    let poly_result: std::result::Result<Polygon<f64>, _> = value.clone().try_into();
    if let Ok(poly) = poly_result {
        return Ok(polygon_wkt(&poly));
    }

    let multi_result: std::result::Result<MultiPolygon<f64>, _> = value.try_into();
    if let Ok(multi) = multi_result {
        return Ok(multipolygon_wkt(&multi));
    }

    Err(AppError::Invalid(
        "unsupported geometry type (expected Polygon or MultiPolygon)".to_string(),
    ))
}

fn ring_wkt(ring: &geo::LineString<f64>) -> String {
    let points: Vec<String> = ring
        .coords()
        .map(|c| format!("{} {}", c.x, c.y))
        .collect();
    format!("({})", points.join(","))
}

fn polygon_rings_wkt(poly: &Polygon<f64>) -> String {
    let mut rings = vec![ring_wkt(poly.exterior())];
    rings.extend(poly.interiors().iter().map(ring_wkt));
    format!("({})", rings.join(","))
}

fn polygon_wkt(poly: &Polygon<f64>) -> String {
    format!("POLYGON{}", polygon_rings_wkt(poly))
}

fn multipolygon_wkt(multi: &MultiPolygon<f64>) -> String {
    let parts: Vec<String> = multi.iter().map(polygon_rings_wkt).collect();
    format!("MULTIPOLYGON({})", parts.join(","))
}
