//! Resolution of capacities for a whole list of URLs within a deadline.
//!
//! Cached estimates are answered right away. Every URL without an estimate
//! gets its own [`Prober`] task, and the resolver waits for the deadline
//! before collecting whatever the probers have written to the cache so far.
//!
//! Probers still running when the deadline passes are **not** stopped. They
//! keep probing in the background and their results end up in the cache for
//! later resolutions. Firing the cancellation token makes their remaining
//! test requests fail fast, which winds them down.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::prober::Prober;
use crate::{CapacityCache, CapacityMap, DEFAULT_CAPACITY, ErrorKind, ProbeExecutor, Result};

/// Default time in seconds a resolution waits for probers, 30.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builder for [`Resolver`].
///
/// ```
/// # use std::sync::Arc;
/// # use headroom_lib::{ClientBuilder, HttpProbe, ResolverBuilder};
/// let client = ClientBuilder::default().client().unwrap();
/// let resolver = ResolverBuilder::builder()
///     .executor(Arc::new(HttpProbe::new(client)))
///     .max_concurrent_probers(16)
///     .build()
///     .resolver();
/// ```
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
Create a builder for building `ResolverBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ResolverBuilder`.
"))]
pub struct ResolverBuilder {
    /// Sends the individual test requests.
    executor: Arc<dyn ProbeExecutor>,

    /// Cache of known capacities.
    ///
    /// Pass an existing cache to share estimates between resolvers.
    #[builder(default)]
    cache: Arc<CapacityCache>,

    /// Token which aborts pending resolutions and makes outstanding test
    /// requests fail fast.
    #[builder(default)]
    cancel: CancellationToken,

    /// Largest batch a single prober sends at once.
    ///
    /// Unbounded by default: a prober keeps doubling its batch size until the
    /// URL starts failing.
    #[builder(default, setter(strip_option(fallback = max_batch_size_opt)))]
    max_batch_size: Option<usize>,

    /// Maximum number of URLs probed at the same time.
    ///
    /// Unbounded by default: every uncached URL starts probing immediately.
    #[builder(default, setter(strip_option(fallback = max_concurrent_probers_opt)))]
    max_concurrent_probers: Option<usize>,
}

impl fmt::Debug for ResolverBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverBuilder")
            .field("cache", &self.cache)
            .field("max_batch_size", &self.max_batch_size)
            .field("max_concurrent_probers", &self.max_concurrent_probers)
            .finish_non_exhaustive()
    }
}

impl ResolverBuilder {
    /// Instantiates a [`Resolver`].
    #[must_use]
    pub fn resolver(self) -> Resolver {
        let prober = Prober::new(
            self.executor,
            Arc::clone(&self.cache),
            self.cancel.clone(),
            self.max_batch_size,
        );
        Resolver {
            cache: self.cache,
            cancel: self.cancel,
            prober,
            probers: self
                .max_concurrent_probers
                .map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
        }
    }
}

/// Turns lists of URLs into capacity estimates.
///
/// See the [module documentation](self) for how probing relates to the
/// deadline.
#[derive(Debug, Clone)]
pub struct Resolver {
    cache: Arc<CapacityCache>,
    cancel: CancellationToken,
    prober: Prober,
    probers: Option<Arc<Semaphore>>,
}

impl Resolver {
    /// Estimate the capacity of every URL in `urls`.
    ///
    /// Returns as soon as all URLs are cached. Otherwise probing starts for
    /// every uncached URL (once per occurrence, duplicates are not merged)
    /// and the resolver waits for the full `deadline`, however many probers
    /// are still running by then.
    ///
    /// The result holds every distinct URL of `urls` exactly once. URLs
    /// without an estimate yet are reported with [`DEFAULT_CAPACITY`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Cancelled`] if the cancellation token fires
    /// before the deadline.
    pub async fn resolve<S: AsRef<str>>(
        &self,
        urls: &[S],
        deadline: Duration,
    ) -> Result<CapacityMap> {
        let cached = self.cache.fetch_many(urls);
        let missing: Vec<&str> = urls
            .iter()
            .map(AsRef::as_ref)
            .filter(|url| !cached.contains_key(*url))
            .collect();

        if missing.is_empty() {
            debug!("All {} URLs are cached", cached.len());
            return Ok(cached);
        }
        if self.cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled);
        }

        info!(
            "Probing {} URLs ({} cached), waiting {deadline:?}",
            missing.len(),
            cached.len()
        );
        for url in missing {
            self.spawn_prober(url);
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ErrorKind::Cancelled),
            () = tokio::time::sleep(deadline) => {}
        }

        Ok(self.collect(urls))
    }

    /// The cache this resolver reads from and its probers write to
    #[must_use]
    pub const fn cache(&self) -> &Arc<CapacityCache> {
        &self.cache
    }

    /// The token which cancels pending resolutions
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn spawn_prober(&self, url: &str) {
        let prober = self.prober.clone();
        let probers = self.probers.clone();
        let url = url.to_string();
        tokio::spawn(async move {
            let _permit = match probers {
                Some(probers) => match probers.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };
            prober.probe(&url).await;
        });
    }

    fn collect<S: AsRef<str>>(&self, urls: &[S]) -> CapacityMap {
        let mut capacities = self.cache.fetch_many(urls);
        for url in urls {
            capacities
                .entry(url.as_ref().to_string())
                .or_insert(DEFAULT_CAPACITY);
        }
        capacities
    }
}
