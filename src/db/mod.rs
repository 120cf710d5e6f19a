//! Database layer (Postgres + PostGIS).
//!
//! All geometry predicates and measurements are pushed into PostGIS; the
//! application only composes SQL and consumes scalar results.

pub mod activities;
pub mod cities;
pub mod comments;
pub mod custom_areas;
pub mod import_status;
pub mod postgres;

pub use postgres::Db;
