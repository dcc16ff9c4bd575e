//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{BridgeConfig, LogFormat};

/// Installs the global tracing subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.log_filter`. Returns `false` if a
/// global subscriber was already installed (by an earlier call or by the
/// host process); the existing one is left in place.
pub fn init(config: &BridgeConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.log_thread_ids)
                    .json(),
            )
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.log_thread_ids)
                    .with_line_number(true),
            )
            .try_init(),
    };

    result.is_ok()
}
