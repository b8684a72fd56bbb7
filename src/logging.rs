//! Logging setup.
//!
//! Library code logs through `tracing` macros; the module path of each call
//! site is the prefix. Binaries call [`init`] once to install a stderr
//! subscriber. `RUST_LOG` overrides the default level.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber writing to stderr.
///
/// `default_directive` applies when `RUST_LOG` is unset, e.g. `"info"` or
/// `"signal_scraper=debug"`. Calling twice is harmless; the second call is
/// ignored.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
