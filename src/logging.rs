//! Structured logging init.
//!
//! Replaces the hand-rolled level-filtered logger style of
//! `flight::logging::FlightLogger` with `tracing` + `tracing-subscriber`,
//! the idiom used elsewhere across this workspace's sibling crates.
//! `RUST_LOG` takes the place of `FLIGHT_LOG_LEVEL`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
