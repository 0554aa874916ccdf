//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

use crate::{models::ticket::ReimportPolicy, services::statistics_service::DEFAULT_RECENT_SCANS};

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string; the in-memory store is used without it
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `STORE_TIMEOUT_MS` (optional): bound on store calls and row-lock waits, defaults to 2000
/// - `REIMPORT_POLICY` (optional): `preserve` or `overwrite`, defaults to `preserve`
/// - `RECENT_SCANS_LIMIT` (optional): scans listed by the statistics endpoint, defaults to 10
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default)]
    pub reimport_policy: ReimportPolicy,

    #[serde(default = "default_recent_scans_limit")]
    pub recent_scans_limit: usize,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_recent_scans_limit() -> usize {
    DEFAULT_RECENT_SCANS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            server_port: default_port(),
            database_max_connections: default_max_connections(),
            store_timeout_ms: default_store_timeout_ms(),
            reimport_policy: ReimportPolicy::default(),
            recent_scans_limit: default_recent_scans_limit(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into
    /// expected types (e.g. `REIMPORT_POLICY=merge`).
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: store_timeout_ms -> STORE_TIMEOUT_MS
        envy::from_env::<Config>()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Bound for database-side waits: pool acquire, row locks, statements.
    ///
    /// A third of `store_timeout`, so a stuck query is reported by PostgreSQL
    /// before the redemption engine gives up on it.
    pub fn database_timeout(&self) -> Duration {
        self.store_timeout() / 3
    }
}
