use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{CapacityCache, ProbeExecutor};

/// Finds the largest number of simultaneous requests a single URL answers
/// successfully.
///
/// The search runs in two phases:
///
/// 1. **Growth**: batches of size 1, 2, 4, ... are sent until a batch has at
///    least one failure. The size of that batch is known to fail. The lower
///    bound stays at 1 during this phase.
/// 2. **Refinement**: a binary search between the lower bound and the
///    failing size. Every fully successful midpoint is written to the cache
///    right away, so readers can observe an improving estimate while probing
///    is still running.
///
/// When the refinement collapses onto a size which was never probed, that
/// size is probed once more before giving up.
///
/// Batches of one URL never overlap. A failed test request is never retried;
/// it only lowers the success count of its batch.
#[derive(Clone)]
pub(crate) struct Prober {
    executor: Arc<dyn ProbeExecutor>,
    cache: Arc<CapacityCache>,
    cancel: CancellationToken,
    max_batch_size: Option<usize>,
}

impl fmt::Debug for Prober {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prober")
            .field("cache", &self.cache)
            .field("max_batch_size", &self.max_batch_size)
            .finish_non_exhaustive()
    }
}

impl Prober {
    pub(crate) fn new(
        executor: Arc<dyn ProbeExecutor>,
        cache: Arc<CapacityCache>,
        cancel: CancellationToken,
        max_batch_size: Option<usize>,
    ) -> Self {
        Self {
            executor,
            cache,
            cancel,
            max_batch_size,
        }
    }

    /// Probe `url` until the estimate converges.
    ///
    /// Nothing is written to the cache if not even a single request succeeds.
    pub(crate) async fn probe(&self, url: &str) {
        let ceiling = self.max_batch_size.unwrap_or(usize::MAX).max(1);
        let mut low = 1;
        let mut high = 1;

        loop {
            if self.batch(url, high).await < high {
                break;
            }
            if high == ceiling {
                debug!("{url}: batch ceiling of {ceiling} reached");
                self.cache.upsert(url, ceiling);
                return;
            }
            high = high.saturating_mul(2).min(ceiling);
        }

        // Smallest batch size observed to fail
        let mut failed_at = high;

        while low < high {
            let mid = low + (high - low) / 2;
            if self.batch(url, mid).await < mid {
                high = mid - 1;
                failed_at = mid;
            } else {
                low = mid + 1;
                self.cache.upsert(url, mid);
            }
        }

        if low == high && low < failed_at && self.batch(url, low).await == low {
            self.cache.upsert(url, low);
        }

        debug!(
            "{url}: converged on capacity {}",
            self.cache.get(url).unwrap_or_default()
        );
    }

    /// Send `size` simultaneous test requests and count the successes.
    ///
    /// Waits for every request of the batch to settle, even after
    /// cancellation.
    async fn batch(&self, url: &str, size: usize) -> usize {
        let target: Arc<str> = Arc::from(url);
        let mut tasks = JoinSet::new();
        for _ in 0..size {
            let executor = Arc::clone(&self.executor);
            let cancel = self.cancel.clone();
            let target = Arc::clone(&target);
            tasks.spawn(async move { executor.test(&target, &cancel).await });
        }

        let mut succeeded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => warn!("{url}: test request task failed: {e}"),
            }
        }

        debug!("{url}: {succeeded}/{size} requests succeeded");
        succeeded
    }
}
