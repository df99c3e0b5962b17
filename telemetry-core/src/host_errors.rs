use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::errors::HostErrorsError;

/// Failed hosts grouped by the exact text of their error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostErrorsResp {
    #[serde(default)]
    pub host_errors: BTreeMap<String, Vec<String>>,
}

impl HostErrorsResp {
    /// Records `host` under `message`. A host already present under any
    /// message keeps its first error and this call returns false.
    pub fn add_host_error(&mut self, host: &str, message: impl Into<String>) -> bool {
        if self.contains_host(host) {
            return false;
        }
        let hosts = self.host_errors.entry(message.into()).or_default();
        hosts.push(host.to_string());
        hosts.sort();
        true
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.host_errors
            .values()
            .any(|hosts| hosts.iter().any(|h| h == host))
    }

    pub fn is_empty(&self) -> bool {
        self.host_errors.is_empty()
    }

    /// Number of distinct failed hosts.
    pub fn error_count(&self) -> usize {
        self.failed_hosts().len()
    }

    pub fn failed_hosts(&self) -> BTreeSet<&str> {
        self.host_errors
            .values()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Collapses the map into a single error when any host failed.
    pub fn errors(&self) -> Result<(), HostErrorsError> {
        match self.error_count() {
            0 => Ok(()),
            failed => Err(HostErrorsError { failed }),
        }
    }
}

/// Concurrent accumulator of per-host failures for one request.
///
/// Keyed by host, so a host can never land under two messages; the first
/// error recorded for a host is the one kept.
#[derive(Debug, Default)]
pub struct HostErrorCollector {
    errors: DashMap<String, String>,
}

impl HostErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the host already had an error recorded.
    pub fn record(&self, host: &str, err: &dyn Display) -> bool {
        match self.errors.entry(host.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(err.to_string());
                true
            }
        }
    }

    pub fn merge(&self) -> HostErrorsResp {
        let mut host_errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.errors.iter() {
            host_errors
                .entry(entry.value().clone())
                .or_default()
                .push(entry.key().clone());
        }
        for hosts in host_errors.values_mut() {
            hosts.sort();
        }
        HostErrorsResp { host_errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::errors::{FetchCause, FetchError};

    #[test]
    fn groups_identical_messages() {
        let collector = HostErrorCollector::new();
        collector.record("h2", &FetchError::new("h2", FetchCause::ConnectionRefused));
        collector.record("h1", &FetchError::new("h1", FetchCause::ConnectionRefused));
        collector.record("h3", &FetchError::new("h3", FetchCause::DeadlineExceeded));

        let resp = collector.merge();
        assert_eq!(resp.host_errors.len(), 2);
        assert_eq!(resp.host_errors["connection refused"], vec!["h1", "h2"]);
        assert_eq!(resp.host_errors["deadline exceeded"], vec!["h3"]);
        assert_eq!(resp.error_count(), 3);
    }

    #[test]
    fn first_error_for_a_host_wins() {
        let collector = HostErrorCollector::new();
        assert!(collector.record("h1", &"first"));
        assert!(!collector.record("h1", &"second"));

        let resp = collector.merge();
        assert_eq!(resp.host_errors.len(), 1);
        assert_eq!(resp.host_errors["first"], vec!["h1"]);
    }

    #[test]
    fn empty_collector_merges_to_empty_resp() {
        let resp = HostErrorCollector::new().merge();
        assert!(resp.is_empty());
        assert!(resp.errors().is_ok());
    }

    #[test]
    fn add_host_error_keeps_one_group_per_host() {
        let mut resp = HostErrorsResp::default();
        assert!(resp.add_host_error("h1", "boom"));
        assert!(!resp.add_host_error("h1", "other"));
        assert!(resp.add_host_error("h0", "boom"));
        assert_eq!(resp.host_errors["boom"], vec!["h0", "h1"]);
        assert!(!resp.host_errors.contains_key("other"));
        assert_eq!(resp.errors(), Err(HostErrorsError { failed: 2 }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_not_lost() {
        let collector = Arc::new(HostErrorCollector::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let collector = collector.clone();
            handles.push(tokio::spawn(async move {
                let message = if i % 2 == 0 { "even" } else { "odd" };
                collector.record(&format!("host-{i:02}"), &message);
            }));
        }
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let resp = collector.merge();
        assert_eq!(resp.error_count(), 64);
        assert_eq!(resp.host_errors["even"].len(), 32);
        assert_eq!(resp.host_errors["odd"].len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_records_for_one_host_keep_a_single_message() {
        let collector = Arc::new(HostErrorCollector::new());
        let barrier = Arc::new(tokio::sync::Barrier::new(32));
        let mut handles = Vec::new();
        for i in 0..32 {
            let collector = collector.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                collector.record("h1", &format!("error {i}"))
            }));
        }
        let mut winners = 0;
        for result in futures::future::join_all(handles).await {
            if result.unwrap() {
                winners += 1;
            }
        }

        let resp = collector.merge();
        assert_eq!(winners, 1);
        assert_eq!(resp.host_errors.len(), 1);
        assert_eq!(resp.error_count(), 1);
        let groups_with_h1 = resp
            .host_errors
            .values()
            .filter(|hosts| hosts.iter().any(|h| h == "h1"))
            .count();
        assert_eq!(groups_with_h1, 1);
    }

    #[test]
    fn serializes_as_message_to_hosts() {
        let mut resp = HostErrorsResp::default();
        resp.add_host_error("h1", "deadline exceeded");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"host_errors": {"deadline exceeded": ["h1"]}})
        );
    }
}
