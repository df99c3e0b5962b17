//! Telemetry collection for cluster hosts.
//!
//! Discovers which metric types a host exposes (the list path) and gathers
//! current values from many hosts at once (the query path). Per-host
//! failures are returned as data in the response, grouped by error message,
//! rather than failing the whole request.

mod errors;
pub use errors::{
    FetchCause, FetchError, HostErrorsError, ParseError, RequestError, Result, ScrapeError,
};

mod context;
pub use context::RequestContext;

mod config;
pub use config::{TelemetryConfig, DEFAULT_TELEMETRY_PORT};

pub mod exposition;
pub use exposition::{MetricFamilies, MetricFamily, MetricKind, Sample};

mod fetcher;
pub use fetcher::{scrape, ExpositionSource, HttpFetcher};

mod host_errors;
pub use host_errors::{HostErrorCollector, HostErrorsResp};

mod types;
pub use types::{
    Metric, MetricValue, MetricsListRequest, MetricsListResponse, MetricsQueryRequest,
    MetricsQueryResponse,
};

pub mod catalog;
pub mod query;

mod client;
pub use client::TelemetryClient;

#[cfg(test)]
mod test_support;
