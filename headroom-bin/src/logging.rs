use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::verbosity::Verbosity;

/// Initialize the logging system with the given verbosity level.
pub(crate) fn init_logging(verbose: Verbosity) {
    // Everything else logs warnings unless RUST_LOG says otherwise.
    let env = Env::default().filter_or("RUST_LOG", "warn");

    let mut builder = Builder::from_env(env);
    builder.format_module_path(false).format_target(false);

    if std::env::var("RUST_LOG").is_err() {
        let level_filter = verbose.log_level_filter();

        builder.filter_level(LevelFilter::Warn);
        builder
            .filter_module("headroom", level_filter)
            .filter_module("headroom_lib", level_filter);
    }

    builder.init();
}
