// SPDX-License-Identifier: MIT

//! Region resolver: path materialisation, city discovery and attribution.
//!
//! Discovery runs before attribution so that newly created cities become
//! attribution candidates within the same pass. The whole pass is
//! idempotent: with no new activities and no new cities it is a no-op.

use crate::db::activities::linestring_wkt;
use crate::db::Db;
use crate::error::Result;
use crate::services::geocoder::Geocoder;

/// Counters from one resolver pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOutcome {
    pub paths_materialized: u64,
    pub cities_discovered: u32,
    pub activities_attributed: u64,
}

/// Builds activity geometries, discovers cities from start-point clusters
/// and attributes activities to cities.
#[derive(Clone)]
pub struct RegionResolver {
    db: Db,
    geocoder: Geocoder,
}

impl RegionResolver {
    pub fn new(db: Db, geocoder: Geocoder) -> Self {
        Self { db, geocoder }
    }

    /// Run a full resolver pass for one user.
    pub async fn resolve_user(&self, user_id: i32) -> Result<ResolveOutcome> {
        let mut outcome = ResolveOutcome::default();

        outcome.paths_materialized = self.materialize_paths(user_id).await?;
        outcome.cities_discovered = self.discover_cities(user_id).await?;
        outcome.activities_attributed = self.db.attribute_activities(user_id).await?;

        tracing::info!(
            user_id,
            paths = outcome.paths_materialized,
            discovered = outcome.cities_discovered,
            attributed = outcome.activities_attributed,
            "Resolver pass complete"
        );

        Ok(outcome)
    }

    /// Build `path` for activities that lack one: decode the encoded
    /// polyline in-process when present, otherwise fall back to a start/end
    /// coordinate linestring. Activities with no coordinate data keep NULL.
    pub async fn materialize_paths(&self, user_id: i32) -> Result<u64> {
        let mut materialized = 0u64;

        for (activity_id, encoded) in self.db.activities_pending_polyline_decode(user_id).await? {
            match polyline::decode_polyline(&encoded, 5) {
                Ok(line) => {
                    if let Some(wkt) = linestring_wkt(line.coords().map(|c| (c.x, c.y))) {
                        self.db.set_activity_path(activity_id, &wkt).await?;
                        materialized += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(activity_id, error = %e.to_string(), "Polyline decode failed");
                }
            }
        }

        materialized += self.db.materialize_coordinate_paths(user_id).await?;
        Ok(materialized)
    }

    /// Discover new cities from the user's activity start clusters.
    ///
    /// Each qualifying cluster centre is reverse geocoded; the cluster is
    /// rejected when a city with the same (name, country) already exists or
    /// any existing city centroid lies within 20 km. Otherwise a city with a
    /// 10 km buffer boundary is created.
    pub async fn discover_cities(&self, user_id: i32) -> Result<u32> {
        let clusters = self.db.activity_start_clusters(user_id).await?;
        let mut created = 0u32;

        for cluster in &clusters {
            let (name, country_code) =
                self.geocoder.reverse(cluster.avg_lat, cluster.avg_lng).await;

            if self
                .db
                .city_exists_nearby(&name, &country_code, cluster.avg_lat, cluster.avg_lng)
                .await?
            {
                tracing::debug!(
                    name = %name,
                    country = %country_code,
                    "Cluster suppressed: matching or nearby city exists"
                );
                continue;
            }

            let city_id = self
                .db
                .create_city_from_center(&name, &country_code, cluster.avg_lat, cluster.avg_lng)
                .await?;
            created += 1;

            tracing::info!(
                city_id,
                name = %name,
                country = %country_code,
                activities = cluster.activity_count,
                "Discovered new city from activity cluster"
            );
        }

        if !clusters.is_empty() && created == 0 {
            tracing::debug!(
                user_id,
                clusters = clusters.len(),
                "Clusters found but no cities created (all suppressed)"
            );
        }

        Ok(created)
    }
}
