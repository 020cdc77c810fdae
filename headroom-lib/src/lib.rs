//! `headroom` estimates how many simultaneous requests a website currently
//! tolerates before it starts failing.
//!
//! For every URL it fires growing batches of simultaneous test requests,
//! then binary-searches the boundary between the largest batch that fully
//! succeeded and the smallest one that did not. Estimates are cached, so
//! repeated lookups are answered without touching the network.
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//! use headroom_lib::{ClientBuilder, HttpProbe, ResolverBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::default().client()?;
//!   let resolver = ResolverBuilder::builder()
//!       .executor(Arc::new(HttpProbe::new(client)))
//!       .build()
//!       .resolver();
//!   let capacities = resolver
//!       .resolve(&["https://example.com"], Duration::from_secs(30))
//!       .await?;
//!   println!("{capacities:?}");
//!   Ok(())
//! }
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

mod cache;
mod client;
mod prober;
mod resolver;
mod service;
mod types;

/// Capabilities for issuing single test requests against a URL
pub mod probe;
/// Turning free-text queries into lists of candidate URLs
pub mod query;

#[cfg(test)]
pub(crate) mod test_utils;

#[doc(inline)]
pub use crate::{
    cache::CapacityCache,
    client::{ClientBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_USER_AGENT},
    probe::{HttpProbe, ProbeExecutor},
    query::{DEFAULT_SEARCH_URL, QueryProvider, SearchClient},
    resolver::{DEFAULT_TIMEOUT_SECS, Resolver, ResolverBuilder},
    service::Service,
    types::{CapacityMap, DEFAULT_CAPACITY, ErrorKind, Result},
};
