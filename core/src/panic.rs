use log::error;
use std::{panic, process, thread};

/// Installs a process-wide hook that turns every panic into an orderly abort.
///
/// Commit-path storage code asserts its invariants by panicking: once a block
/// is accepted, a half-applied state commit must never be survived, because
/// future blocks would chain against trees we no longer agree on. The hook
/// logs the panic, lets the default hook print its backtrace, and exits.
pub fn configure_panic() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.as_str()
        } else {
            "<opaque panic payload>"
        };
        let location = info.location().map(|loc| loc.to_string()).unwrap_or_else(|| "<unknown location>".to_string());
        let thread = thread::current();

        error!("thread '{}' panicked at {location}: {message}", thread.name().unwrap_or("<unnamed>"));
        default_hook(info);
        error!("state integrity can no longer be guaranteed, exiting");
        process::exit(1);
    }));
}
