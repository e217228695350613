//! Configuration Module
//!
//! Handles loading and managing daemon configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Daemon configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Age in seconds below which cached data is served without a refresh
    pub stale_window_secs: u64,
    /// Age in seconds above which the reaper evicts an entry
    pub max_age_secs: u64,
    /// Reaper sweep period in seconds
    pub reap_interval_secs: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Base URL of the remote plans API
    pub source_url: String,
    /// Optional bearer token for the remote plans API
    pub source_token: Option<String>,
    /// Remote request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STALE_WINDOW_SECS` - Freshness window (default: 10)
    /// - `MAX_AGE_SECS` - Eviction ceiling (default: 30)
    /// - `REAP_INTERVAL_SECS` - Reaper sweep period (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PLANS_API_URL` - Remote plans API base URL (default: http://localhost:8080/api)
    /// - `PLANS_API_TOKEN` - Bearer token for the remote API (default: none)
    /// - `REQUEST_TIMEOUT_SECS` - Remote request timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stale_window_secs: env_or("STALE_WINDOW_SECS", defaults.stale_window_secs),
            max_age_secs: env_or("MAX_AGE_SECS", defaults.max_age_secs),
            reap_interval_secs: env_or("REAP_INTERVAL_SECS", defaults.reap_interval_secs),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            source_url: env::var("PLANS_API_URL").unwrap_or(defaults.source_url),
            source_token: env::var("PLANS_API_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
        }
    }

    /// Rejects combinations the cache cannot honor.
    ///
    /// An entry must become stale before it becomes evictable, so
    /// `max_age` has to exceed `stale_window`.
    pub fn validate(&self) -> Result<()> {
        if self.max_age_secs <= self.stale_window_secs {
            return Err(SyncError::Config(format!(
                "MAX_AGE_SECS ({}) must be greater than STALE_WINDOW_SECS ({})",
                self.max_age_secs, self.stale_window_secs
            )));
        }
        if self.reap_interval_secs == 0 {
            return Err(SyncError::Config(
                "REAP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache timing parameters as durations.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            stale_window: Duration::from_secs(self.stale_window_secs),
            max_age: Duration::from_secs(self.max_age_secs),
            reap_interval: Duration::from_secs(self.reap_interval_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stale_window_secs: 10,
            max_age_secs: 30,
            reap_interval_secs: 60,
            server_port: 3000,
            source_url: "http://localhost:8080/api".to_string(),
            source_token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Timing parameters consumed by the cache itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Below this age cached data is returned without a network call
    pub stale_window: Duration,
    /// Above this age the reaper evicts the entry
    pub max_age: Duration,
    /// Reaper sweep period
    pub reap_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Config::default().sync_config()
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
