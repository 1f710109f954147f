//! Dynamic security configuration library

pub mod auth;
pub mod config;
pub mod limiting;
pub mod observability;
pub mod snapshot;

pub use auth::{AuthDecision, AuthRequest, BackendFactory, Protocol};
pub use config::schema::SecurityConfig;
pub use snapshot::{ConfigManager, ConfigSnapshot, ConfigurationError};
