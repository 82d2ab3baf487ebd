//! Logging setup for the command service.
//!
//! Events are written to stdout through `tracing-subscriber`:
//!
//! - Filtering comes from `RUST_LOG`, defaulting to `info`.
//! - Timestamps are local time in RFC 3339 format.
//! - `--log-json` switches the human-readable output to one JSON object per
//!   line for log shippers.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber was already installed.
pub fn init_telemetry(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339()),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .with_file(true),
            )
            .try_init()?;
    }

    Ok(())
}
