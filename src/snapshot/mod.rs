//! Configuration snapshots.
//!
//! # Data Flow
//! ```text
//! DynamicConfig
//!     → builder.rs plan (resolve aliases, check ordering, compile xff)
//!     → builder.rs instantiate (backend factory)
//!     → ListenerStore::reconcile (limiters carried across generations)
//!     → ConfigSnapshot (immutable)
//!     → manager.rs publishes with one atomic swap
//! ```
//!
//! # Design Decisions
//! - A snapshot is never mutated after publication
//! - Readers never block; a reload never exposes a half-built generation
//! - Any build error aborts the reload and the previous snapshot stays live

pub mod builder;
pub mod error;
pub mod manager;
pub mod model;

pub use builder::{AuthorizerPlan, DomainPlan, SnapshotBuilder, SnapshotPlan};
pub use error::ConfigurationError;
pub use manager::ConfigManager;
pub use model::{ConfigSnapshot, DashboardsSettings, OnBehalfOfSettings};
