//! ABOUTME: Logging infrastructure shared by every SOE binary and test harness
//! ABOUTME: Thin wrapper over tracing-subscriber's env-filter + fmt layers

/// Initialize structured logging from `RUST_LOG` (or `info` if unset).
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .map_err(|e| e.into())
}
