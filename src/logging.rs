//! Tracing subscriber setup for tools embedding the session runner.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("localsession=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("localsession=info"))
    }
}

/// Initialize the global tracing subscriber.
///
/// Log level is controlled by:
/// 1. `debug` sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(debug: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter(debug))
        .init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_tracing(debug: bool) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter(debug))
        .try_init()
        .is_ok()
}
