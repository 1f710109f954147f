//! Brute-force defense subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → global address limiters (is the client blocked?)
//!     → per-backend limiters (is this address/username blocked here?)
//!     → backend denies credentials
//!     → rate_limiter.rs records the failure, blocks on threshold
//!
//! On reload:
//!     → listeners.rs reconciles limiters by (name, kind)
//!     → surviving limiters keep counters, new ones start empty
//! ```
//!
//! # Design Decisions
//! - Limiter state lives outside snapshots; snapshots only reference it
//! - Counters use per-shard locks (DashMap), so no update is lost
//! - Sliding window; the history is cleared once a key is blocked

pub mod listeners;
pub mod rate_limiter;

pub use listeners::{ClientLimiter, LimiterSet, ListenerPlan, ListenerStore};
pub use rate_limiter::{
    AddressRateLimiter, ClientBlockRegistry, FailureListener, LimiterSettings, RateLimiter,
    UsernameRateLimiter,
};
