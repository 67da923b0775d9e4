//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a configured level, scoped to this crate.
pub fn default_directive(level: &str) -> String {
    format!("hello_httpd={}", level.to_ascii_lowercase())
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_targets_crate() {
        assert_eq!(default_directive("DEBUG"), "hello_httpd=debug");
    }

    #[test]
    fn second_init_is_harmless() {
        init_logging("info");
        assert!(!init_logging("info"));
    }
}
