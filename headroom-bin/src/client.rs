use std::sync::Arc;

use anyhow::{Context, Result};
use headroom_lib::{ClientBuilder, HttpProbe, ResolverBuilder, SearchClient, Service};
use tokio_util::sync::CancellationToken;

use crate::options::Config;

/// Creates the query service according to the command-line config
///
/// Search requests and test requests share one HTTP client. `cancel` is
/// fired on shutdown to abort pending queries and wind down background
/// probing.
pub(crate) fn create(cfg: &Config, cancel: CancellationToken) -> Result<Service> {
    let client = ClientBuilder::builder()
        .user_agent(cfg.user_agent.clone())
        .max_redirects(cfg.max_redirects)
        .allow_insecure(cfg.insecure)
        .build()
        .client()
        .context("Failed to create HTTP client")?;

    let provider = SearchClient::parse(client.clone(), &cfg.search_url)
        .with_context(|| format!("Invalid search URL `{}`", cfg.search_url))?;

    let executor = HttpProbe::new(client).with_timeout(cfg.probe_timeout());

    let resolver = ResolverBuilder::builder()
        .executor(Arc::new(executor))
        .cancel(cancel)
        .max_batch_size_opt(cfg.max_batch_size)
        .max_concurrent_probers_opt(cfg.max_concurrent_probers)
        .build()
        .resolver();

    Ok(Service::new(Arc::new(provider), resolver, cfg.timeout()))
}
