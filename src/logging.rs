//! Logging initialization with environment-based formatters
//!
//! - Production: structured JSON logs
//! - Anything else: human-readable logs
//!
//! Logs go to stderr so they never interleave with the report tables on stdout.

use crate::config::get_environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let is_production = matches!(get_environment().as_str(), "production" | "prod");

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if is_production {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}
