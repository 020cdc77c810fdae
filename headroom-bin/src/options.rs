use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::{fs, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use const_format::{concatcp, formatcp};
use headroom_lib::{
    DEFAULT_MAX_REDIRECTS, DEFAULT_SEARCH_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use serde::Deserialize;

use crate::verbosity::Verbosity;

pub(crate) const HEADROOM_CONFIG_FILE: &str = "headroom.toml";

const DEFAULT_LISTEN_PORT: u16 = 80;

// clap requires `&str` default values whereas serde expects owned values
// (we can't use e.g. `TIMEOUT` or `timeout()` which gets created for serde)
const TIMEOUT_STR: &str = concatcp!(DEFAULT_TIMEOUT_SECS);
const MAX_REDIRECTS_STR: &str = concatcp!(DEFAULT_MAX_REDIRECTS);
const LISTEN_STR: &str = concatcp!("0.0.0.0:", DEFAULT_LISTEN_PORT);
// Shows the default file name while still telling apart whether the user
// passed a file. A missing default file is not an error.
const HELP_MSG_CONFIG_FILE: &str = formatcp!(
    "Configuration file to use\n\n[default: {}]",
    HEADROOM_CONFIG_FILE,
);

macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    timeout: u64 = DEFAULT_TIMEOUT_SECS;
    listen: SocketAddr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT));
    search_url: String = DEFAULT_SEARCH_URL.to_string();
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    max_redirects: usize = DEFAULT_MAX_REDIRECTS;
    verbosity: Verbosity = Verbosity::default();
}

// Macro for merging configuration values
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// headroom answers search queries with an estimate of how many simultaneous
/// requests each site in the results currently tolerates.
///
/// Every site is probed with growing batches of simultaneous requests; the
/// largest batch that fully succeeded is its capacity.
#[derive(Parser, Debug)]
#[command(version, about, next_display_order = None)]
pub(crate) struct HeadroomOptions {
    #[arg(short, long = "config", help = HELP_MSG_CONFIG_FILE)]
    pub(crate) config_file: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) config: Config,
}

/// The main configuration for headroom
#[derive(clap::Args, Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default = "verbosity")]
    pub(crate) verbose: Verbosity,

    /// Seconds to wait for probing before answering a query
    ///
    /// Sites still being probed when the timeout expires are reported with
    /// their best known capacity and keep being probed in the background.
    #[arg(short, long, default_value = TIMEOUT_STR)]
    #[serde(default = "timeout")]
    pub(crate) timeout: u64,

    /// Address the HTTP server listens on
    #[arg(short, long, env = "HEADROOM_LISTEN", default_value = LISTEN_STR)]
    #[serde(default = "listen")]
    pub(crate) listen: SocketAddr,

    /// Search results page queried for candidate sites
    ///
    /// The query is appended as the `text` parameter.
    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    #[serde(default = "search_url")]
    pub(crate) search_url: String,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Maximum number of allowed redirects per request
    #[arg(short, long, default_value = MAX_REDIRECTS_STR)]
    #[serde(default = "max_redirects")]
    pub(crate) max_redirects: usize,

    /// Proceed for server connections considered insecure (invalid TLS)
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) insecure: bool,

    /// Seconds after which a single test request counts as failed
    #[arg(long)]
    #[serde(default)]
    pub(crate) probe_timeout: Option<u64>,

    /// Largest batch of simultaneous test requests sent to a single site
    #[arg(long)]
    #[serde(default)]
    pub(crate) max_batch_size: Option<usize>,

    /// Maximum number of sites probed at the same time
    #[arg(long)]
    #[serde(default)]
    pub(crate) max_concurrent_probers: Option<usize>,

    /// Number of threads to utilize.
    /// Defaults to number of cores available to the system
    #[arg(short = 'T', long)]
    #[serde(default)]
    pub(crate) threads: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // NOTE: if you see an error within this macro call, check to make sure
        // that the fields provided to fold_in! match all the fields of the Config struct.
        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                verbose: Verbosity::default(),
                timeout: DEFAULT_TIMEOUT_SECS,
                listen: listen(),
                search_url: DEFAULT_SEARCH_URL,
                user_agent: DEFAULT_USER_AGENT,
                max_redirects: DEFAULT_MAX_REDIRECTS,
                insecure: false,
                probe_timeout: None,
                max_batch_size: None,
                max_concurrent_probers: None,
                threads: None,
            }
        }
    }

    /// Overall resolution deadline of a single query
    pub(crate) const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Timeout of a single test request, if any
    pub(crate) fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn cli(args: &[&str]) -> Config {
        let mut argv = vec!["headroom"];
        argv.extend_from_slice(args);
        HeadroomOptions::parse_from(argv).config
    }

    #[test]
    fn test_cli_defaults() {
        let config = cli(&[]);

        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.listen, "0.0.0.0:80".parse().unwrap());
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(config.probe_timeout(), None);
        assert_eq!(config.max_batch_size, None);
        assert_eq!(config.max_concurrent_probers, None);
        assert_eq!(config.verbose, Verbosity::default());
    }

    #[test]
    fn test_empty_file_has_cli_defaults() {
        let toml: Config = toml::from_str("").unwrap();
        let defaults = cli(&[]);

        assert_eq!(toml.timeout, defaults.timeout);
        assert_eq!(toml.listen, defaults.listen);
        assert_eq!(toml.search_url, defaults.search_url);
        assert_eq!(toml.user_agent, defaults.user_agent);
        assert_eq!(toml.max_redirects, defaults.max_redirects);
        assert_eq!(toml.verbose, defaults.verbose);
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            timeout = 5
            listen = "127.0.0.1:8080"
            search_url = "https://search.example/?lang=en"
            probe_timeout = 2
            max_batch_size = 64
            max_concurrent_probers = 8
            verbose = "debug"
            "#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.listen, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.search_url, "https://search.example/?lang=en");
        assert_eq!(config.probe_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.max_batch_size, Some(64));
        assert_eq!(config.max_concurrent_probers, Some(8));
        assert_eq!(config.verbose.log_level_filter(), log::LevelFilter::Debug);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_unknown_key() {
        let result: Result<Config, _> = toml::from_str("unknown = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_merge_file_under_cli() {
        let toml: Config = toml::from_str(
            r#"
            timeout = 5
            user_agent = "from-file/1.0"
            max_batch_size = 64
            "#,
        )
        .unwrap();

        let mut config = cli(&["--timeout", "12", "--max-concurrent-probers", "3"]);
        config.merge(toml);

        // Explicit CLI values win over the file
        assert_eq!(config.timeout, 12);
        assert_eq!(config.max_concurrent_probers, Some(3));
        // File values fill in CLI defaults
        assert_eq!(config.user_agent, "from-file/1.0");
        assert_eq!(config.max_batch_size, Some(64));
        // Untouched on both sides
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
    }

    #[test]
    fn test_config_file_flag() {
        let opts = HeadroomOptions::parse_from(["headroom", "--config", "custom.toml"]);
        assert_eq!(opts.config_file, Some(PathBuf::from("custom.toml")));
    }
}
