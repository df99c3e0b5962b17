use std::sync::Arc;

use crate::catalog;
use crate::config::TelemetryConfig;
use crate::context::RequestContext;
use crate::errors::Result;
use crate::fetcher::{ExpositionSource, HttpFetcher};
use crate::query;
use crate::types::{MetricsListRequest, MetricsListResponse, MetricsQueryRequest, MetricsQueryResponse};

/// Entry point for the list and query operations.
///
/// Holds no per-request state; every call builds its response from scratch.
#[derive(Clone)]
pub struct TelemetryClient {
    source: Arc<dyn ExpositionSource>,
    config: TelemetryConfig,
}

impl TelemetryClient {
    /// Scrapes hosts over plain HTTP.
    pub fn new(config: TelemetryConfig) -> reqwest::Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_source(Arc::new(fetcher), config))
    }

    pub fn with_source(source: Arc<dyn ExpositionSource>, config: TelemetryConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Lists the metric types exposed by the first host of the request.
    ///
    /// Only request validation errors are returned as `Err`; a failing host
    /// shows up in the response's host errors.
    pub async fn list_metrics(
        &self,
        ctx: &RequestContext,
        req: &MetricsListRequest,
    ) -> Result<MetricsListResponse> {
        self.config.validate()?;
        catalog::list_metrics(self.source.as_ref(), ctx, req).await
    }

    /// Collects current values from every host of the request concurrently.
    pub async fn query_metrics(
        &self,
        ctx: &RequestContext,
        req: &MetricsQueryRequest,
    ) -> Result<MetricsQueryResponse> {
        self.config.validate()?;
        query::query_metrics(self.source.clone(), ctx, req, self.config.max_concurrency).await
    }
}
