//! Tracing setup shared by the three binaries.
//!
//! A scaled-down tracing init: one stdout layer, `EnvFilter`-driven, no
//! file/otel layers since spawn has nowhere long-lived to ship them to.
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("could not initialize tracing: {0}")]
    Init(String),
}

/// Initializes the global `tracing` subscriber. Honors `RUST_LOG`, defaulting
/// to `info` for `spawn` itself and `warn` for dependencies. When `debug` is
/// set (`--debug` / `SPAWN_DEBUG=1`) the default floor is `debug` instead.
pub fn try_init_tracing(debug: bool) -> Result<(), TracingError> {
    let default_directive = if debug { "spawn=debug,warn" } else { "spawn=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .try_init()
        .map_err(|err| TracingError::Init(err.to_string()))
}
