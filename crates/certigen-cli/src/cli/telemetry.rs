//! Log output of the `certigen` binary.
//!
//! Library events are emitted through `tracing` and printed to stderr by a
//! `fmt` layer, leaving stdout for command results. The level defaults to
//! `info` and can be overridden with `RUST_LOG`, e.g.
//! `RUST_LOG=certigen=debug` to log every generated certificate.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339()),
        )
        .try_init()?;
    Ok(())
}
