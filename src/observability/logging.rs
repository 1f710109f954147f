//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from the environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the default directive

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "dynamic_security=info";

/// Install the global subscriber.
pub fn init_logging(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
