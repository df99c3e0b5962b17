use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RequestError, Result};

/// Port the engine telemetry exporter listens on unless told otherwise.
pub const DEFAULT_TELEMETRY_PORT: u16 = 9191;

/// Configuration for scraping telemetry endpoints
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// HTTP path of the exposition endpoint
    pub path: String,
    /// Per-host request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Upper bound on hosts scraped at once by a query; unbounded when None
    pub max_concurrency: Option<usize>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            path: "/metrics".to_string(),
            request_timeout_ms: env_parse("TELEMETRY_REQUEST_TIMEOUT_MS").unwrap_or(5000),
            max_concurrency: env_parse("TELEMETRY_MAX_CONCURRENCY"),
        }
    }
}

impl TelemetryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(RequestError::InvalidConcurrency);
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
