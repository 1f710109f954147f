//! Limiter instances and their lifetime across snapshot generations.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::auth::alias::KeyKind;
use crate::limiting::rate_limiter::{
    AddressRateLimiter, ClientBlockRegistry, FailureListener, LimiterSettings, UsernameRateLimiter,
};

/// A configured limiter of either key kind.
#[derive(Debug, Clone)]
pub enum ClientLimiter {
    Address(Arc<AddressRateLimiter>),
    Username(Arc<UsernameRateLimiter>),
}

impl ClientLimiter {
    pub fn new(name: &str, kind: KeyKind, settings: LimiterSettings) -> Self {
        match kind {
            KeyKind::Address => ClientLimiter::Address(Arc::new(AddressRateLimiter::new(name, settings))),
            KeyKind::Username => {
                ClientLimiter::Username(Arc::new(UsernameRateLimiter::new(name, settings)))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClientLimiter::Address(limiter) => limiter.name(),
            ClientLimiter::Username(limiter) => limiter.name(),
        }
    }

    pub fn key_kind(&self) -> KeyKind {
        match self {
            ClientLimiter::Address(_) => KeyKind::Address,
            ClientLimiter::Username(_) => KeyKind::Username,
        }
    }

    pub fn settings(&self) -> Arc<LimiterSettings> {
        match self {
            ClientLimiter::Address(limiter) => limiter.settings(),
            ClientLimiter::Username(limiter) => limiter.settings(),
        }
    }

    fn update_settings(&self, settings: LimiterSettings) {
        match self {
            ClientLimiter::Address(limiter) => limiter.update_settings(settings),
            ClientLimiter::Username(limiter) => limiter.update_settings(settings),
        }
    }

    /// Record a failed attempt under whichever key this limiter tracks.
    pub fn on_auth_failure(&self, address: IpAddr, username: Option<&str>) -> bool {
        match self {
            ClientLimiter::Address(limiter) => limiter.record_failure(&address),
            ClientLimiter::Username(limiter) => match username {
                Some(name) => limiter.record_failure(&name.to_string()),
                None => false,
            },
        }
    }

    /// Whether the client is blocked under whichever key this limiter tracks.
    pub fn is_blocked(&self, address: IpAddr, username: Option<&str>) -> bool {
        match self {
            ClientLimiter::Address(limiter) => limiter.is_blocked(&address),
            ClientLimiter::Username(limiter) => {
                username.is_some_and(|name| limiter.is_blocked(&name.to_string()))
            }
        }
    }
}

/// What one configured listener should look like after a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerPlan {
    pub name: String,
    pub kind: KeyKind,
    /// Canonical name of the bound authentication backend; `None` is global.
    pub backend: Option<String>,
    pub settings: LimiterSettings,
}

/// Limiters placed the way a snapshot exposes them.
#[derive(Debug, Clone, Default)]
pub struct LimiterSet {
    /// Global address limiters: failure listeners and block registries at once.
    pub ip: Vec<Arc<AddressRateLimiter>>,
    /// Limiters bound to an authentication backend, by backend name.
    pub by_backend: HashMap<String, Vec<ClientLimiter>>,
}

/// Owner of limiter state across reloads.
///
/// Only the reconfiguration path touches the store; request threads reach
/// limiters through the snapshot that referenced them.
#[derive(Debug, Default)]
pub struct ListenerStore {
    limiters: HashMap<(String, KeyKind), ClientLimiter>,
}

impl ListenerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the store in line with `plans`.
    ///
    /// Limiters whose name and kind survive keep their counters and get the
    /// new settings; new identities start empty; vanished ones are dropped.
    pub fn reconcile(&mut self, plans: &[ListenerPlan]) -> LimiterSet {
        let mut retained = HashMap::with_capacity(plans.len());
        let mut set = LimiterSet::default();

        for plan in plans {
            let identity = (plan.name.clone(), plan.kind);
            let limiter = match self.limiters.remove(&identity) {
                Some(existing) => {
                    if *existing.settings() != plan.settings {
                        tracing::info!(listener = %plan.name, "Updating auth failure listener settings");
                        existing.update_settings(plan.settings.clone());
                    }
                    existing
                }
                None => {
                    tracing::info!(listener = %plan.name, kind = %plan.kind, "Creating auth failure listener");
                    ClientLimiter::new(&plan.name, plan.kind, plan.settings.clone())
                }
            };

            match (&plan.backend, &limiter) {
                (None, ClientLimiter::Address(address)) => set.ip.push(address.clone()),
                (Some(backend), _) => set
                    .by_backend
                    .entry(backend.clone())
                    .or_default()
                    .push(limiter.clone()),
                (None, ClientLimiter::Username(_)) => {
                    tracing::warn!(listener = %plan.name, "Username listener without backend ignored");
                }
            }
            retained.insert(identity, limiter);
        }

        for (name, kind) in self.limiters.keys() {
            tracing::info!(listener = %name, kind = %kind, "Dropping auth failure listener");
        }
        self.limiters = retained;
        set
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn plan(name: &str, kind: KeyKind, backend: Option<&str>, tries: u32) -> ListenerPlan {
        ListenerPlan {
            name: name.into(),
            kind,
            backend: backend.map(str::to_string),
            settings: LimiterSettings {
                allowed_tries: tries,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_placement() {
        let mut store = ListenerStore::new();
        let set = store.reconcile(&[
            plan("ip", KeyKind::Address, None, 10),
            plan("ldap_ip", KeyKind::Address, Some("ldap"), 10),
            plan("ldap_users", KeyKind::Username, Some("ldap"), 10),
        ]);

        assert_eq!(set.ip.len(), 1);
        assert_eq!(set.by_backend["ldap"].len(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_state_survives_matching_identity() {
        let mut store = ListenerStore::new();
        let first = store.reconcile(&[plan("ip", KeyKind::Address, None, 10)]);
        let addr: IpAddr = "192.0.2.9".parse().unwrap();
        first.ip[0].record_failure(&addr);

        let second = store.reconcile(&[plan("ip", KeyKind::Address, None, 4)]);
        assert!(Arc::ptr_eq(&first.ip[0], &second.ip[0]));
        assert_eq!(second.ip[0].current_count(&addr), 1);
        assert_eq!(second.ip[0].settings().allowed_tries, 4);
    }

    #[test]
    fn test_identity_change_resets_state() {
        let mut store = ListenerStore::new();
        let first = store.reconcile(&[plan("limit", KeyKind::Address, Some("ldap"), 10)]);
        first.by_backend["ldap"][0].on_auth_failure("192.0.2.9".parse().unwrap(), Some("bob"));

        let second = store.reconcile(&[plan("limit", KeyKind::Username, Some("ldap"), 10)]);
        let ClientLimiter::Username(users) = &second.by_backend["ldap"][0] else {
            panic!("expected username limiter");
        };
        assert_eq!(users.current_count(&"bob".to_string()), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_username_limiter_ignores_missing_username() {
        let limiter = ClientLimiter::new(
            "users",
            KeyKind::Username,
            LimiterSettings {
                allowed_tries: 1,
                block_expiry: Duration::from_secs(60),
                ..Default::default()
            },
        );
        let addr: IpAddr = "192.0.2.1".parse().unwrap();
        assert!(!limiter.on_auth_failure(addr, None));
        assert!(limiter.on_auth_failure(addr, Some("bob")));
        assert!(limiter.is_blocked(addr, Some("bob")));
        assert!(!limiter.is_blocked(addr, None));
    }
}
