//! List path: the catalog of metric types a cluster exposes.
//!
//! Metric definitions come from the server binary, so a homogeneous cluster
//! exposes the same catalog on every host and only the first host in the
//! request is consulted. Hosts running different versions may disagree;
//! the response only ever describes that first host.

use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::errors::Result;
use crate::exposition::MetricFamilies;
use crate::fetcher::{scrape, ExpositionSource};
use crate::types::{Metric, MetricsListRequest, MetricsListResponse};

pub async fn list_metrics(
    source: &dyn ExpositionSource,
    ctx: &RequestContext,
    req: &MetricsListRequest,
) -> Result<MetricsListResponse> {
    req.validate()?;

    let host = &req.host_list[0];
    let mut resp = MetricsListResponse::default();
    match scrape(source, ctx, host, req.port).await {
        Ok(families) => {
            resp.available_metrics = build_catalog(&families);
            debug!(host = %host, metrics = resp.available_metrics.len(), "listed metrics");
        }
        Err(err) => {
            warn!(host = %host, error = %err, "unable to list metrics");
            resp.host_errors.add_host_error(host, err.to_string());
        }
    }
    Ok(resp)
}

/// One entry per family, descriptions kept even when empty.
pub fn build_catalog(families: &MetricFamilies) -> Vec<Metric> {
    families
        .values()
        .map(|family| Metric {
            name: family.name.clone(),
            description: family.help.clone(),
        })
        .collect()
}
