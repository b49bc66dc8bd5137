//! Diagnostic logging
//!
//! Configure via the RUST_LOG environment variable:
//! - `RUST_LOG=debug` - all debug logs
//! - `RUST_LOG=cardcode::syntax=trace` - module-level filtering
//!
//! Output goes to stderr so it never mixes with highlighted text on stdout.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when RUST_LOG is unset
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(verbose)
        .with_filter(filter);

    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}
