//! Deterministic probe executors and query providers for tests.
//!
//! The load-based fakes measure concurrency in real (or paused) tokio time,
//! so tests using them should run with `#[tokio::test(start_paused = true)]`.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{CapacityCache, ErrorKind, ProbeExecutor, QueryProvider, Result};

/// How long a fake test request stays in flight
const REQUEST_DURATION: Duration = Duration::from_millis(10);

/// Succeeds only while at most `limit` requests are in flight at once.
///
/// Each request stays in flight for [`REQUEST_DURATION`] and then checks how
/// many requests are still running. With paused time every request of a
/// batch is started before the first one finishes, so a batch of `n`
/// requests fully succeeds exactly when `n <= limit`.
#[derive(Debug)]
pub(crate) struct LoadLimitedProbe {
    limit: usize,
    in_flight: AtomicUsize,
}

impl LoadLimitedProbe {
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            limit,
            in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProbeExecutor for LoadLimitedProbe {
    async fn test(&self, _url: &str, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(REQUEST_DURATION).await;
        let load = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        load <= self.limit
    }
}

/// Fails every request and counts how often it was called.
#[derive(Debug, Default)]
pub(crate) struct FailingProbe {
    calls: AtomicUsize,
}

impl FailingProbe {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeExecutor for FailingProbe {
    async fn test(&self, _url: &str, _cancel: &CancellationToken) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

/// Never answers unless cancelled.
#[derive(Debug, Default)]
pub(crate) struct StallingProbe;

#[async_trait]
impl ProbeExecutor for StallingProbe {
    async fn test(&self, _url: &str, cancel: &CancellationToken) -> bool {
        cancel.cancelled().await;
        false
    }
}

/// Applies a different load limit per URL.
///
/// URLs without a limit always fail.
#[derive(Debug, Default)]
pub(crate) struct PerUrlProbe {
    limits: HashMap<String, LoadLimitedProbe>,
}

impl PerUrlProbe {
    pub(crate) fn with_limit(mut self, url: &str, limit: usize) -> Self {
        self.limits
            .insert(url.to_string(), LoadLimitedProbe::new(limit));
        self
    }
}

#[async_trait]
impl ProbeExecutor for PerUrlProbe {
    async fn test(&self, url: &str, cancel: &CancellationToken) -> bool {
        match self.limits.get(url) {
            Some(probe) => probe.test(url, cancel).await,
            None => false,
        }
    }
}

/// Wraps another executor and records every distinct cache value it
/// observes for a URL right before sending a request.
///
/// Since the prober only writes between batches, this sees every write
/// except the last one, which [`ObservingProbe::observed`] reads from the
/// cache directly.
#[derive(Debug)]
pub(crate) struct ObservingProbe<P> {
    inner: P,
    cache: Arc<CapacityCache>,
    observed: Mutex<HashMap<String, Vec<usize>>>,
}

impl<P> ObservingProbe<P> {
    pub(crate) fn new(inner: P, cache: Arc<CapacityCache>) -> Self {
        Self {
            inner,
            cache,
            observed: Mutex::default(),
        }
    }

    pub(crate) fn observed(&self, url: &str) -> Vec<usize> {
        let mut values = self
            .observed
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default();
        if let Some(last) = self.cache.get(url)
            && values.last() != Some(&last)
        {
            values.push(last);
        }
        values
    }
}

#[async_trait]
impl<P: ProbeExecutor> ProbeExecutor for ObservingProbe<P> {
    async fn test(&self, url: &str, cancel: &CancellationToken) -> bool {
        if let Some(current) = self.cache.get(url) {
            let mut observed = self.observed.lock().unwrap();
            let values = observed.entry(url.to_string()).or_default();
            if values.last() != Some(&current) {
                values.push(current);
            }
        }
        self.inner.test(url, cancel).await
    }
}

/// Wraps another executor and records the size of every batch it serves.
///
/// Requests of one batch all start at the same paused-clock instant, while
/// consecutive batches are at least one request duration apart.
#[derive(Debug)]
pub(crate) struct BatchRecorder<P> {
    inner: P,
    starts: Mutex<Vec<Instant>>,
}

impl<P> BatchRecorder<P> {
    pub(crate) const fn new(inner: P) -> Self {
        Self {
            inner,
            starts: Mutex::new(Vec::new()),
        }
    }

    /// Batch sizes in the order they were sent
    pub(crate) fn batches(&self) -> Vec<usize> {
        let starts = self.starts.lock().unwrap();
        starts
            .chunk_by(|a, b| a == b)
            .map(<[Instant]>::len)
            .collect()
    }
}

#[async_trait]
impl<P: ProbeExecutor> ProbeExecutor for BatchRecorder<P> {
    async fn test(&self, url: &str, cancel: &CancellationToken) -> bool {
        self.starts.lock().unwrap().push(Instant::now());
        self.inner.test(url, cancel).await
    }
}

/// Query provider returning a fixed answer.
#[derive(Debug)]
pub(crate) enum StaticQuery {
    Urls(Vec<String>),
    Unavailable,
    Stalled,
}

#[async_trait]
impl QueryProvider for StaticQuery {
    async fn query(&self, _text: &str) -> Result<Vec<String>> {
        match self {
            Self::Urls(urls) => Ok(urls.clone()),
            Self::Unavailable => Err(ErrorKind::InvalidResponse(
                http::StatusCode::SERVICE_UNAVAILABLE,
            )),
            Self::Stalled => std::future::pending().await,
        }
    }
}
