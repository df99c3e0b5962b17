//! Request and response shapes for the list and query paths.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::{RequestError, Result};
use crate::host_errors::HostErrorsResp;

/// A metric type exposed by a host.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "metric_name")]
    pub name: String,
    #[serde(rename = "metric_description")]
    pub description: String,
}

/// One observation of a metric on one host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    #[serde(flatten)]
    pub metric: Metric,
    #[serde(rename = "metric_value")]
    pub value: String,
}

/// Requests the catalog of metric types. Only the first host is consulted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsListRequest {
    pub host_list: Vec<String>,
    pub port: u16,
}

impl MetricsListRequest {
    pub fn new(host_list: Vec<String>, port: u16) -> Self {
        Self { host_list, port }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_targets(&self.host_list, self.port)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsListResponse {
    #[serde(flatten)]
    pub host_errors: HostErrorsResp,
    pub available_metrics: Vec<Metric>,
}

/// Requests current values from every host. An empty `metric_names` selects
/// every metric a host exposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsQueryRequest {
    pub host_list: Vec<String>,
    pub port: u16,
    #[serde(default)]
    pub metric_names: BTreeSet<String>,
}

impl MetricsQueryRequest {
    pub fn new(host_list: Vec<String>, port: u16) -> Self {
        Self {
            host_list,
            port,
            metric_names: BTreeSet::new(),
        }
    }

    pub fn with_metric_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metric_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_targets(&self.host_list, self.port)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsQueryResponse {
    #[serde(flatten)]
    pub host_errors: HostErrorsResp,
    pub metrics_by_host: HashMap<String, HashMap<String, MetricValue>>,
}

fn validate_targets(host_list: &[String], port: u16) -> Result<()> {
    if host_list.is_empty() {
        return Err(RequestError::EmptyHostList);
    }
    if port == 0 {
        return Err(RequestError::InvalidPort(port));
    }
    for host in host_list {
        if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(RequestError::InvalidHost(host.clone()));
        }
    }
    Ok(())
}

/// Drops repeated hosts, keeping the first occurrence of each.
pub(crate) fn distinct_hosts(host_list: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    host_list
        .iter()
        .filter(|host| seen.insert(host.as_str()))
        .cloned()
        .collect()
}
