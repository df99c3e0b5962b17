//! Query path: current metric values from every requested host.
//!
//! Each host is scraped by its own task. A host contributes either its whole
//! filtered map to `metrics_by_host` or a single entry in the host error map,
//! never both and never a partial map.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::context::RequestContext;
use crate::errors::{FetchError, RequestError, Result};
use crate::exposition::MetricFamilies;
use crate::fetcher::{scrape, ExpositionSource};
use crate::host_errors::HostErrorCollector;
use crate::types::{distinct_hosts, Metric, MetricValue, MetricsQueryRequest, MetricsQueryResponse};

pub async fn query_metrics(
    source: Arc<dyn ExpositionSource>,
    ctx: &RequestContext,
    req: &MetricsQueryRequest,
    max_concurrency: Option<usize>,
) -> Result<MetricsQueryResponse> {
    req.validate()?;
    if max_concurrency == Some(0) {
        return Err(RequestError::InvalidConcurrency);
    }

    let hosts = distinct_hosts(&req.host_list);
    let collector = Arc::new(HostErrorCollector::new());
    let limiter = max_concurrency.map(|permits| Arc::new(Semaphore::new(permits)));
    let names = Arc::new(req.metric_names.clone());

    let mut tasks = Vec::with_capacity(hosts.len());
    for host in &hosts {
        let task = tokio::spawn(query_host(
            source.clone(),
            ctx.clone(),
            host.clone(),
            req.port,
            names.clone(),
            limiter.clone(),
            collector.clone(),
        ));
        tasks.push(task);
    }

    let results = join_all(tasks).await;

    let mut metrics_by_host = HashMap::with_capacity(hosts.len());
    for (host, result) in hosts.iter().zip(results) {
        match result {
            Ok(Some(values)) => {
                metrics_by_host.insert(host.clone(), values);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(host = %host, error = %e, "metrics query task failed");
                collector.record(host, &format!("task failed: {}", e));
            }
        }
    }

    let host_errors = collector.merge();
    info!(
        hosts = hosts.len(),
        succeeded = metrics_by_host.len(),
        failed = host_errors.error_count(),
        "metrics query complete"
    );

    Ok(MetricsQueryResponse {
        host_errors,
        metrics_by_host,
    })
}

/// Scrapes one host. Failures are recorded into the collector and yield None.
async fn query_host(
    source: Arc<dyn ExpositionSource>,
    ctx: RequestContext,
    host: String,
    port: u16,
    names: Arc<BTreeSet<String>>,
    limiter: Option<Arc<Semaphore>>,
    collector: Arc<HostErrorCollector>,
) -> Option<HashMap<String, MetricValue>> {
    let _permit = match limiter {
        Some(limiter) => {
            let acquired = tokio::select! {
                biased;
                cause = ctx.done() => Err(FetchError::new(&host, cause)),
                permit = limiter.acquire_owned() => Ok(permit),
            };
            match acquired {
                Ok(Ok(permit)) => Some(permit),
                Ok(Err(_closed)) => {
                    collector.record(&host, &"concurrency limiter closed");
                    return None;
                }
                Err(err) => {
                    debug!(host = %host, error = %err, "gave up waiting for a scrape slot");
                    collector.record(&host, &err);
                    return None;
                }
            }
        }
        None => None,
    };

    match scrape(source.as_ref(), &ctx, &host, port).await {
        Ok(families) => Some(select_values(families, &names)),
        Err(err) => {
            warn!(host = %host, error = %err, "unable to query metrics");
            collector.record(&host, &err);
            None
        }
    }
}

/// Keeps the requested names, or everything when `names` is empty. Names
/// match exactly; requested names the host does not expose are skipped.
pub fn select_values(
    families: MetricFamilies,
    names: &BTreeSet<String>,
) -> HashMap<String, MetricValue> {
    families
        .into_iter()
        .filter(|(name, _)| names.is_empty() || names.contains(name))
        .map(|(name, family)| {
            let value = MetricValue {
                value: family.render_value(),
                metric: Metric {
                    name: name.clone(),
                    description: family.help,
                },
            };
            (name, value)
        })
        .collect()
}
