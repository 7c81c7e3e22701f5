//! Observability for gitdb
//!
//! - Structured logging through `tracing`; every line carries an `event`
//!   field from [`Event`]
//! - Per-connection counters in [`MetricsRegistry`]
//!
//! The library never installs a subscriber. Binaries call [`init_logging`].

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use tracing_subscriber::EnvFilter;

/// Install a JSON subscriber writing one object per line to stderr.
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`. Calling
/// this twice is harmless; the second call is ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
