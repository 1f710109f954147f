//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SecurityConfig (raw, aliases unresolved)
//!     → snapshot builder (resolve, instantiate, publish)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new document
//!     → validation.rs validates
//!     → ConfigManager::reload builds and swaps the snapshot
//! ```
//!
//! # Design Decisions
//! - The raw document is never consulted at request time; only snapshots are
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AuthcDomainConfig, AuthzDomainConfig, BackendConfig, DashboardsConfig, DynamicConfig,
    FailureListenerConfig, FilteredAliasMode, HostsResolverMode, HttpAuthenticatorConfig,
    OnBehalfOfConfig, SecurityConfig, Settings, SignInOption, XffConfig,
};
