//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! AuthRequest
//!     → xff.rs (who is the client?)
//!     → chain.rs
//!         → global block registries
//!         → domain 1..n by order:
//!             http authenticator (extract credentials or abstain)
//!             backend block registries
//!             authentication backend (authenticated / abstain / denied)
//!     → authz.rs (aggregate roles over the authorizer set)
//!     → AuthDecision
//! ```
//!
//! # Design Decisions
//! - Backend kinds are closed enums; aliases in alias.rs map onto them
//! - Backend instances come from a [`BackendFactory`], so directory and
//!   identity-provider integrations live outside this crate
//! - A domain whose authenticator finds no credentials abstains; only an
//!   explicit backend denial counts as a failed attempt

pub mod alias;
pub mod authz;
pub mod backend;
pub mod builtin;
pub mod chain;
pub mod domain;
pub mod xff;

pub use alias::{
    AliasRegistry, AuthorizationBackendKind, CredentialBackendKind, Direction,
    HttpAuthenticatorKind, Implementation, KeyKind, UnknownAliasError,
};
pub use authz::aggregate_roles;
pub use backend::{
    AuthRequest, AuthenticationBackend, AuthorizationBackend, BackendError, BackendFactory,
    Credentials, HttpAuthenticator, RequestContext, User, Verdict,
};
pub use builtin::BuiltinFactory;
pub use chain::{authenticate, authenticate_and_authorize, AuthDecision, DenialReason};
pub use domain::{AuthDomain, AuthorizerDomain, Protocol};
pub use xff::XffSettings;
