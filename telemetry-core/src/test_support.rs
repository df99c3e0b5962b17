use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::errors::{FetchCause, FetchError};
use crate::fetcher::ExpositionSource;

#[derive(Clone, Debug)]
pub(crate) enum HostBehavior {
    Body(Vec<u8>),
    Fail(FetchCause),
    /// Never answers; only the context can end the fetch.
    Hang,
    Delayed(Duration, Vec<u8>),
    /// Panics inside the fetch, taking the scrape task down with it.
    Panic,
}

impl HostBehavior {
    pub(crate) fn body(text: &str) -> Self {
        HostBehavior::Body(text.as_bytes().to_vec())
    }
}

/// In-memory exposition source keyed by host. Unknown hosts refuse connections.
#[derive(Default)]
pub(crate) struct FakeSource {
    hosts: HashMap<String, HostBehavior>,
    calls: Mutex<Vec<(String, u16)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, host: &str, behavior: HostBehavior) -> Self {
        self.hosts.insert(host.to_string(), behavior);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, u16)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExpositionSource for FakeSource {
    async fn fetch(
        &self,
        ctx: &RequestContext,
        host: &str,
        port: u16,
    ) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push((host.to_string(), port));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behavior = self
            .hosts
            .get(host)
            .cloned()
            .unwrap_or(HostBehavior::Fail(FetchCause::ConnectionRefused));
        let result = match behavior {
            HostBehavior::Body(body) => Ok(body),
            HostBehavior::Fail(cause) => Err(FetchError::new(host, cause)),
            HostBehavior::Hang => Err(FetchError::new(host, ctx.done().await)),
            HostBehavior::Delayed(delay, body) => {
                tokio::select! {
                    cause = ctx.done() => Err(FetchError::new(host, cause)),
                    _ = tokio::time::sleep(delay) => Ok(body),
                }
            }
            HostBehavior::Panic => panic!("exposition source for {host} blew up"),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
