//! Logging
//!
//! Request tracing is off by default and switched on process-wide, usually
//! once at startup from [`LoggingConfig::log_requests`]. Subscriber setup is
//! left to binaries; [`init`] is the one the bundled CLI uses.

use crate::config::LoggingConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static REQUEST_LOGGING: AtomicBool = AtomicBool::new(false);

/// Enable or disable logging of outgoing request bodies and URLs
pub fn set_request_logging(enabled: bool) {
    REQUEST_LOGGING.store(enabled, Ordering::Relaxed);
}

pub fn request_logging_enabled() -> bool {
    REQUEST_LOGGING.load(Ordering::Relaxed)
}

/// Install a global subscriber for the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    set_request_logging(config.log_requests);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("keen_query={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_logging_toggle() {
        set_request_logging(true);
        assert!(request_logging_enabled());
        set_request_logging(false);
        assert!(!request_logging_enabled());
    }
}
