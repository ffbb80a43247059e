//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sip_cfg={},tower_http=info", log_level)))
}

/// Initialize the global tracing subscriber.
///
/// Returns false if a subscriber was already installed.
pub fn init(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
