//! Local SQLite storage

mod database;

pub use database::{Database, SCHEMA_VERSION};
