//! Logging setup for the release binaries.
//!
//! Library code logs through the `log` facade. The binaries call [`init`]
//! once at start-up, which installs a `tracing-subscriber` formatter on
//! stderr; its `tracing-log` bridge picks up the `log` records.

use log::LevelFilter;
use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter as TracingLevel;

/// Select the log level for the given verbosity flag.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use otaship_common::logging::level_for;
///
/// assert_eq!(level_for(true), LevelFilter::Debug);
/// assert_eq!(level_for(false), LevelFilter::Info);
/// ```
#[must_use]
pub const fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the stderr subscriber.
///
/// Colour is used only when stderr is a terminal. Returns `false` when a
/// global subscriber or logger was already installed, in which case the
/// existing one keeps receiving records.
pub fn init(verbose: bool) -> bool {
    let level = match level_for(verbose) {
        LevelFilter::Debug => TracingLevel::DEBUG,
        _ => TracingLevel::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
