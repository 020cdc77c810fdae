//! `-v`/`-q` flags controlling how much the server logs.
//!
//! Without flags the server logs at `info` level:
//! - `-q` only warnings, `-qq` only errors, `-qqq` nothing
//! - `-v` debug output, including every probing batch
//! - `-vv` trace output, including individual test request failures

use log::LevelFilter;
use serde::Deserialize;

#[derive(clap::Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Verbosity {
    /// More log output per occurrence
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet",
    )]
    verbose: u8,

    /// Less log output per occurrence
    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

impl Verbosity {
    /// Get the log level filter.
    pub(crate) fn log_level_filter(self) -> LevelFilter {
        match i16::from(self.verbose) - i16::from(self.quiet) {
            i16::MIN..=-3 => LevelFilter::Off,
            -2 => LevelFilter::Error,
            -1 => LevelFilter::Warn,
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            2..=i16::MAX => LevelFilter::Trace,
        }
    }

    const fn from_level(level: LevelFilter) -> Self {
        let (verbose, quiet) = match level {
            LevelFilter::Off => (0, 3),
            LevelFilter::Error => (0, 2),
            LevelFilter::Warn => (0, 1),
            LevelFilter::Info => (0, 0),
            LevelFilter::Debug => (1, 0),
            LevelFilter::Trace => (2, 0),
        };
        Self { verbose, quiet }
    }
}

// Deserialized from a level name like "warn", "warning" or "Debug"
impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let level = match s.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            level => {
                return Err(serde::de::Error::custom(format!(
                    "invalid log level `{level}`"
                )));
            }
        };
        Ok(Self::from_level(level))
    }
}
