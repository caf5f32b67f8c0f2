//! Logging initialization.
//!
//! For the macros to properly compile, the calling crate must add a dependency to
//! crate log (ie. `log.workspace = true`).

pub use log::{debug, error, info, trace, warn};

/// Inits the global logger with the given filter string (e.g. "info,vertex_consensus=debug").
pub fn init_logger(filters: &str) {
    env_logger::Builder::new()
        .format_target(false)
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .parse_filters(filters)
        .init();
}

/// Tries to init the global logger, but does not panic if it was already setup.
/// Should be used for tests.
pub fn try_init_logger(filters: &str) {
    let _ = env_logger::Builder::new()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .parse_filters(filters)
        .try_init();
}
