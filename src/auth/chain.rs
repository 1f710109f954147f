//! Evaluation of the authentication domain chain for one request.

use std::net::IpAddr;

use crate::auth::authz::aggregate_roles;
use crate::auth::backend::{AuthRequest, User, Verdict};
use crate::auth::domain::{AuthDomain, Protocol};
use crate::limiting::{ClientBlockRegistry, FailureListener};
use crate::observability::metrics;
use crate::snapshot::ConfigSnapshot;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// A global address limiter has blocked the client.
    ClientBlocked,
    /// A limiter bound to the domain's backend has blocked the client.
    BackendBlocked { backend: String, domain: String },
    /// The backend rejected the presented credentials.
    CredentialsRejected { domain: String },
    /// No domain recognized the request and anonymous access is off.
    NoApplicableDomain,
}

/// Result of running a request through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated { user: User, domain: String },
    Anonymous { user: User },
    Denied(DenialReason),
    /// Authentication is switched off for the protocol.
    Bypassed,
}

impl AuthDecision {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthDecision::Authenticated { user, .. } | AuthDecision::Anonymous { user } => Some(user),
            AuthDecision::Denied(_) | AuthDecision::Bypassed => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AuthDecision::Denied(_))
    }

    fn outcome(&self) -> &'static str {
        match self {
            AuthDecision::Authenticated { .. } => "authenticated",
            AuthDecision::Anonymous { .. } => "anonymous",
            AuthDecision::Denied(DenialReason::ClientBlocked | DenialReason::BackendBlocked { .. }) => {
                "blocked"
            }
            AuthDecision::Denied(_) => "denied",
            AuthDecision::Bypassed => "bypassed",
        }
    }
}

/// Authenticate `request` against the domains of `snapshot`.
///
/// The caller should hold one snapshot for the whole request.
pub fn authenticate(snapshot: &ConfigSnapshot, protocol: Protocol, request: &AuthRequest) -> AuthDecision {
    let decision = evaluate(snapshot, protocol, request);
    metrics::record_auth_decision(protocol.as_str(), decision.outcome());
    decision
}

/// Authenticate, then merge roles from the protocol's authorizers into the user.
///
/// Anonymous principals keep their fixed backend role.
pub fn authenticate_and_authorize(
    snapshot: &ConfigSnapshot,
    protocol: Protocol,
    request: &AuthRequest,
) -> AuthDecision {
    match authenticate(snapshot, protocol, request) {
        AuthDecision::Authenticated { mut user, domain } => {
            let roles = aggregate_roles(
                snapshot.authorizers(protocol),
                &user,
                snapshot.is_multi_rolespan_enabled(),
            );
            user.backend_roles.extend(roles);
            AuthDecision::Authenticated { user, domain }
        }
        other => other,
    }
}

fn evaluate(snapshot: &ConfigSnapshot, protocol: Protocol, request: &AuthRequest) -> AuthDecision {
    if snapshot.is_auth_disabled(protocol) {
        return AuthDecision::Bypassed;
    }

    let ctx = snapshot.xff().resolve(request);
    let address = ctx.client_address;

    if snapshot
        .ip_client_block_registries()
        .iter()
        .any(|registry| registry.is_blocked(&address))
    {
        tracing::debug!(client = %address, "Request from blocked client");
        metrics::record_blocked_request("global");
        return AuthDecision::Denied(DenialReason::ClientBlocked);
    }

    for domain in snapshot.auth_domains(protocol) {
        let Some(credentials) = domain.http_authenticator().extract_credentials(&ctx) else {
            continue;
        };
        let username = credentials.username.as_str();

        if is_blocked_for_backend(snapshot, domain, address, username) {
            tracing::debug!(
                client = %address,
                user = %username,
                domain = %domain.name(),
                backend = domain.backend_name(),
                "Request blocked by backend limiter"
            );
            metrics::record_blocked_request("backend");
            return AuthDecision::Denied(DenialReason::BackendBlocked {
                backend: domain.backend_name().to_string(),
                domain: domain.name().to_string(),
            });
        }

        match domain.backend().authenticate(&credentials) {
            Ok(Verdict::Authenticated(user)) => {
                tracing::debug!(user = %user.name, domain = %domain.name(), "Authenticated");
                return AuthDecision::Authenticated {
                    user,
                    domain: domain.name().to_string(),
                };
            }
            Ok(Verdict::Abstain) => continue,
            Ok(Verdict::Denied) => {
                tracing::info!(
                    client = %address,
                    user = %username,
                    domain = %domain.name(),
                    "Authentication failed"
                );
                record_failure(snapshot, domain, address, username);
                return AuthDecision::Denied(DenialReason::CredentialsRejected {
                    domain: domain.name().to_string(),
                });
            }
            Err(e) => {
                tracing::warn!(
                    domain = %domain.name(),
                    error = %e,
                    "Authentication backend error, skipping domain"
                );
            }
        }
    }

    if snapshot.is_anonymous_authentication_enabled() {
        AuthDecision::Anonymous {
            user: User::anonymous(),
        }
    } else {
        AuthDecision::Denied(DenialReason::NoApplicableDomain)
    }
}

fn is_blocked_for_backend(snapshot: &ConfigSnapshot, domain: &AuthDomain, address: IpAddr, username: &str) -> bool {
    snapshot
        .backend_limiters(domain.backend_name())
        .iter()
        .any(|limiter| limiter.is_blocked(address, Some(username)))
}

fn record_failure(snapshot: &ConfigSnapshot, domain: &AuthDomain, address: IpAddr, username: &str) {
    for listener in snapshot.ip_auth_failure_listeners() {
        listener.record_failure(&address);
    }
    for listener in snapshot.backend_limiters(domain.backend_name()) {
        listener.on_auth_failure(address, Some(username));
    }
}
