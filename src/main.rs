// SPDX-License-Identifier: MIT

//! Coverage-Tracker API server
//!
//! Ingests Strava activities, attributes them to cities and user-drawn
//! areas, and tracks per-region coverage over time.

use coverage_tracker::{
    config::Config,
    db::Db,
    services::{
        seed, CommentService, CoverageService, CustomAreaService, Geocoder, ImportService,
        OnboardingService, RegionResolver, StravaClient,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Coverage-Tracker API");

    let db = Db::connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    if let Some(seed_path) = &config.city_seed_path {
        tracing::info!(path = %seed_path, "Seeding city boundaries");
        let seeded = seed::seed_cities_from_file(&db, seed_path)
            .await
            .expect("Failed to seed city boundaries");
        tracing::info!(count = seeded, "City boundaries seeded");
    }

    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let geocoder = Geocoder::new();

    let importer = ImportService::new(db.clone(), strava.clone());
    let resolver = RegionResolver::new(db.clone(), geocoder);
    let coverage = CoverageService::new(db.clone());
    let custom_areas = CustomAreaService::new(db.clone());
    let comments = CommentService::new(db.clone(), strava.clone());
    let onboarding = OnboardingService::new(
        db.clone(),
        strava.clone(),
        importer.clone(),
        resolver.clone(),
        coverage.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        strava,
        importer,
        resolver,
        coverage,
        custom_areas,
        comments,
        onboarding,
    });

    let app = coverage_tracker::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("coverage_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
