use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Initialize logging for development (human-readable format)
pub fn init_dev_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();
}

/// Initialize logging for production (JSON format)
pub fn init_prod_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_line_number(true)
        .json()
        .init();
}

pub fn init(format: LogFormat) {
    match format {
        LogFormat::Dev => init_dev_logging(),
        LogFormat::Json => init_prod_logging(),
    }
}
