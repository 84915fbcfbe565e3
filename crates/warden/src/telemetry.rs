//! Logging setup for binaries built on Warden.
//!
//! The library crates only emit `tracing` events; installing a subscriber
//! is the application's call. This helper installs the usual one.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::WardenError;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"warden=debug,info"`).
///
/// # Errors
/// [`WardenError::Telemetry`] if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), WardenError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(filter),
        )
        .try_init()?;
    Ok(())
}
