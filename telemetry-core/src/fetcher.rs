use std::error::Error as StdError;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::config::TelemetryConfig;
use crate::context::RequestContext;
use crate::errors::{FetchCause, FetchError, ScrapeError};
use crate::exposition::{self, MetricFamilies};

/// Retrieves the raw exposition body served by one host.
///
/// Implementations make exactly one attempt and must give up as soon as
/// `ctx` is cancelled or its deadline passes.
#[async_trait]
pub trait ExpositionSource: Send + Sync {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        host: &str,
        port: u16,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Fetches and parses one host's metrics.
pub async fn scrape(
    source: &dyn ExpositionSource,
    ctx: &RequestContext,
    host: &str,
    port: u16,
) -> Result<MetricFamilies, ScrapeError> {
    let body = source.fetch(ctx, host, port).await?;
    Ok(exposition::parse(&body)?)
}

/// Plain-HTTP exposition source backed by reqwest
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    path: String,
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &TelemetryConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .no_proxy()
            .build()?;
        let path = if config.path.starts_with('/') {
            config.path.clone()
        } else {
            format!("/{}", config.path)
        };
        Ok(Self { path, http })
    }

    pub fn endpoint(&self, host: &str, port: u16) -> Result<Url, FetchCause> {
        // bare IPv6 literals need brackets before the port
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let raw = format!("http://{}{}", authority, self.path);
        Url::parse(&raw).map_err(|e| FetchCause::InvalidUrl(format!("{}: {}", raw, e)))
    }

    async fn get_body(&self, url: Url) -> Result<Vec<u8>, FetchCause> {
        let resp = self.http.get(url).send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }
        let body = resp.bytes().await.map_err(classify)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ExpositionSource for HttpFetcher {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        host: &str,
        port: u16,
    ) -> Result<Vec<u8>, FetchError> {
        if let Some(cause) = ctx.err() {
            return Err(FetchError::new(host, cause));
        }
        let url = self
            .endpoint(host, port)
            .map_err(|cause| FetchError::new(host, cause))?;
        debug!(host, url = %url, "scraping metrics endpoint");

        tokio::select! {
            biased;
            cause = ctx.done() => Err(FetchError::new(host, cause)),
            result = self.get_body(url) => result.map_err(|cause| FetchError::new(host, cause)),
        }
    }
}

/// Maps a reqwest failure to a host-independent cause.
fn classify(err: reqwest::Error) -> FetchCause {
    if err.is_timeout() {
        return FetchCause::DeadlineExceeded;
    }
    if err.is_connect() && source_chain_has_refused(&err) {
        return FetchCause::ConnectionRefused;
    }
    // the url carries the host name, which would split otherwise identical messages
    let err = err.without_url();
    match root_cause(&err) {
        Some(root) => FetchCause::Transport(format!("{}: {}", err, root)),
        None => FetchCause::Transport(err.to_string()),
    }
}

fn source_chain_has_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn root_cause(err: &(dyn StdError + 'static)) -> Option<String> {
    let mut current = err.source()?;
    while let Some(next) = current.source() {
        current = next;
    }
    Some(current.to_string())
}
