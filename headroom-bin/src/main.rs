//! `headroom` is an HTTP service which answers search queries with an
//! estimate of how many simultaneous requests each site in the results
//! currently tolerates.
//!
//! The headroom binary is a wrapper around headroom-lib, which does the
//! actual probing; this crate adds configuration, logging and the HTTP API.
//!
//! Start the server on port 8080:
//! ```sh
//! headroom --listen 127.0.0.1:8080
//! ```
//!
//! Then ask for the sites of a query:
//! ```sh
//! curl 'http://127.0.0.1:8080/sites?search=rust+async'
//! ```
//!
//! Configuration is read from `headroom.toml` in the working directory if
//! it exists, or from the file given with `--config`. Command line flags
//! take precedence over the file.
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

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod client;
mod logging;
mod options;
mod server;
mod verbosity;

use crate::{
    logging::init_logging,
    options::{Config, HEADROOM_CONFIG_FILE, HeadroomOptions},
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator, e.g. an invalid search URL or a listen address
    // which is already in use.
    #[allow(unused)]
    UnexpectedFailure = 1,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge a potential config file into the options from the command line.
///
/// An explicitly given config file must exist. The default config file is
/// only loaded if it exists, but raises an error if it is invalid.
fn load_config(opts: &mut HeadroomOptions) -> Result<()> {
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        let default_config = PathBuf::from(HEADROOM_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }
    Ok(())
}

/// Set up runtime and call headroom entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let mut opts = HeadroomOptions::parse();
    let loaded = load_config(&mut opts);

    // Initialized after merging, so `verbose` from the config file applies
    init_logging(opts.config.verbose);

    if let Err(e) = loaded {
        error!("Error while loading config: {e}");
        exit(ExitCode::ConfigFile as i32);
    }

    let runtime = match opts.config.threads {
        Some(threads) => {
            // We define our own runtime instead of the `tokio::main` attribute
            // since we want to make the number of threads configurable
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .enable_all()
                .build()?
        }
        None => tokio::runtime::Runtime::new()?,
    };

    runtime.block_on(run(&opts.config))
}

/// Serve the API until shutdown
async fn run(cfg: &Config) -> Result<i32> {
    let cancel = CancellationToken::new();
    let service = client::create(cfg, cancel.clone())?;

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("Cannot listen on {}", cfg.listen))?;
    info!("Listening on {}", listener.local_addr()?);

    server::serve(listener, service, cancel).await?;
    Ok(ExitCode::Success as i32)
}
