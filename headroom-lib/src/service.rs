use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::{CapacityMap, ErrorKind, QueryProvider, Resolver, Result};

/// Answers free-text queries with the capacities of the URLs they find.
///
/// This connects a [`QueryProvider`] to a [`Resolver`]: the provider turns
/// the query into URLs, the resolver estimates their capacities within the
/// configured timeout.
#[derive(Clone)]
pub struct Service {
    provider: Arc<dyn QueryProvider>,
    resolver: Resolver,
    timeout: Duration,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("resolver", &self.resolver)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Create a service resolving the results of `provider` with `resolver`,
    /// waiting at most `timeout` for probing.
    #[must_use]
    pub fn new(provider: Arc<dyn QueryProvider>, resolver: Resolver, timeout: Duration) -> Self {
        Self {
            provider,
            resolver,
            timeout,
        }
    }

    /// Look up `query` and resolve the capacities of all URLs it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the query provider fails, or
    /// [`ErrorKind::Cancelled`] if the cancellation token fires while
    /// querying or resolving.
    pub async fn execute(&self, query: &str) -> Result<CapacityMap> {
        let urls = tokio::select! {
            biased;
            () = self.resolver.cancellation_token().cancelled() => return Err(ErrorKind::Cancelled),
            urls = self.provider.query(query) => urls?,
        };
        info!("Query {query:?} returned {} URLs", urls.len());

        self.resolver.resolve(&urls, self.timeout).await
    }

    /// The resolver answering queries
    #[must_use]
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::ResolverBuilder;
    use crate::test_utils::{PerUrlProbe, StaticQuery};

    fn service(query: StaticQuery, cancel: CancellationToken) -> Service {
        let probe = PerUrlProbe::default()
            .with_limit("https://a.example", 3)
            .with_limit("https://b.example", 8);
        let resolver = ResolverBuilder::builder()
            .executor(Arc::new(probe))
            .cancel(cancel)
            .build()
            .resolver();
        Service::new(Arc::new(query), resolver, Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute() {
        let query = StaticQuery::Urls(vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
            "https://c.example".to_string(),
        ]);
        let service = service(query, CancellationToken::new());

        let capacities = service.execute("anything").await.unwrap();

        assert_eq!(
            capacities,
            CapacityMap::from([
                ("https://a.example".to_string(), 3),
                ("https://b.example".to_string(), 8),
                ("https://c.example".to_string(), 1),
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_without_results() {
        let service = service(StaticQuery::Urls(vec![]), CancellationToken::new());

        let capacities = service.execute("nothing").await.unwrap();
        assert!(capacities.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_is_returned() {
        let service = service(StaticQuery::Unavailable, CancellationToken::new());

        let result = service.execute("anything").await;
        assert!(matches!(result, Err(ErrorKind::InvalidResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_querying() {
        let cancel = CancellationToken::new();
        let service = service(StaticQuery::Stalled, cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = service.execute("anything").await;
        assert!(matches!(result, Err(ErrorKind::Cancelled)));
    }
}
