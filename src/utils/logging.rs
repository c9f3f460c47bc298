//! Logging
//!
//! tracing-subscriber setup for the terminal driver. Log lines go to stderr
//! so they never interleave with the wizard transcript on stdout.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither RUST_LOG nor the config sets one
pub const DEFAULT_FILTER: &str = "info,wizard_flow=debug";

/// Initialize tracing.
///
/// `RUST_LOG` wins over `configured`; `configured` wins over the default.
/// Calling this twice is harmless (the second call is ignored).
pub fn init(configured: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        configured
            .and_then(|filter| EnvFilter::try_new(filter).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .compact();

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Tracing initialized");
    }
}
