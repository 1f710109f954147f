//! Sliding-window failure counting and client blocking.
//!
//! One `RateLimiter<K>` is both the failure listener and the block registry
//! for its key kind: once `allowed_tries` failures land within the window,
//! the key is blocked for `block_expiry` and its history is cleared.

use std::collections::VecDeque;
use std::fmt::Display;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::auth::alias::KeyKind;
use crate::config::FailureListenerConfig;
use crate::observability::metrics;

/// Tunables of one limiter. Swappable at reload without losing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterSettings {
    pub allowed_tries: u32,
    pub time_window: Duration,
    pub block_expiry: Duration,
    pub max_blocked_clients: usize,
    pub max_tracked_clients: usize,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self::from(&FailureListenerConfig::default())
    }
}

impl From<&FailureListenerConfig> for LimiterSettings {
    fn from(config: &FailureListenerConfig) -> Self {
        Self {
            allowed_tries: config.allowed_tries.max(1),
            time_window: Duration::from_secs(config.time_window_seconds),
            block_expiry: Duration::from_secs(config.block_expiry_seconds),
            max_blocked_clients: config.max_blocked_clients,
            max_tracked_clients: config.max_tracked_clients,
        }
    }
}

/// Counts failed authentication attempts per key.
pub trait FailureListener<K> {
    /// Record one failure. Returns true if this failure blocked the key.
    fn record_failure(&self, key: &K) -> bool;

    /// Failures currently inside the window for `key`.
    fn current_count(&self, key: &K) -> usize;
}

/// Keys currently denied because of repeated failures.
pub trait ClientBlockRegistry<K> {
    fn is_blocked(&self, key: &K) -> bool;

    fn block(&self, key: K, duration: Duration);

    fn key_kind(&self) -> KeyKind;
}

/// Keys a limiter can be instantiated for.
pub trait ClientKey: Clone + Eq + Hash + Display + Send + Sync + 'static {
    const KIND: KeyKind;
}

impl ClientKey for IpAddr {
    const KIND: KeyKind = KeyKind::Address;
}

impl ClientKey for String {
    const KIND: KeyKind = KeyKind::Username;
}

/// Thread-safe sliding-window limiter keyed by `K`.
#[derive(Debug)]
pub struct RateLimiter<K: ClientKey> {
    name: String,
    settings: ArcSwap<LimiterSettings>,
    /// Failure timestamps per key, oldest first.
    failures: DashMap<K, VecDeque<Instant>>,
    /// Block expiry per key.
    blocked: DashMap<K, Instant>,
}

pub type AddressRateLimiter = RateLimiter<IpAddr>;
pub type UsernameRateLimiter = RateLimiter<String>;

impl<K: ClientKey> RateLimiter<K> {
    pub fn new(name: impl Into<String>, settings: LimiterSettings) -> Self {
        Self {
            name: name.into(),
            settings: ArcSwap::from_pointee(settings),
            failures: DashMap::new(),
            blocked: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> Arc<LimiterSettings> {
        self.settings.load_full()
    }

    /// Replace the tunables, keeping counters and blocks.
    pub fn update_settings(&self, settings: LimiterSettings) {
        self.settings.store(Arc::new(settings));
    }

    /// [`FailureListener::record_failure`] at an explicit instant.
    pub fn record_failure_at(&self, key: &K, now: Instant) -> bool {
        let settings = self.settings.load();

        let new_key = !self.failures.contains_key(key);
        if new_key && self.failures.len() >= settings.max_tracked_clients {
            self.purge_stale_failures(now, settings.time_window);
            if self.failures.len() >= settings.max_tracked_clients {
                tracing::debug!(limiter = %self.name, "Tracked client limit reached, failure not recorded");
                return false;
            }
        }

        let limit_reached = {
            let mut history = self.failures.entry(key.clone()).or_default();
            prune(&mut history, now, settings.time_window);
            history.push_back(now);
            while history.len() > settings.allowed_tries as usize {
                history.pop_front();
            }
            let reached = history.len() >= settings.allowed_tries as usize;
            if reached {
                // cleared under the entry lock so concurrent failures cannot
                // trip the same threshold twice
                history.clear();
            }
            reached
        };

        // Concurrent first failures of distinct keys can all pass the check
        // above; whoever lands over the cap backs out its own entry.
        if new_key && !limit_reached && self.failures.len() > settings.max_tracked_clients {
            self.failures.remove_if(key, |_, history| history.len() <= 1);
            tracing::debug!(limiter = %self.name, "Tracked client limit reached, failure not recorded");
            return false;
        }
        metrics::record_auth_failure(&self.name);

        if limit_reached {
            self.failures.remove_if(key, |_, history| history.is_empty());
            self.block_at(key.clone(), now, settings.block_expiry);
        }
        limit_reached
    }

    /// [`FailureListener::current_count`] at an explicit instant.
    pub fn current_count_at(&self, key: &K, now: Instant) -> usize {
        let window = self.settings.load().time_window;
        self.failures
            .get(key)
            .map(|history| {
                history
                    .iter()
                    .filter(|at| now.saturating_duration_since(**at) < window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// [`ClientBlockRegistry::is_blocked`] at an explicit instant.
    pub fn is_blocked_at(&self, key: &K, now: Instant) -> bool {
        let active = match self.blocked.get(key) {
            Some(expiry) => *expiry > now,
            None => return false,
        };
        if !active {
            self.blocked.remove_if(key, |_, expiry| *expiry <= now);
        }
        active
    }

    /// [`ClientBlockRegistry::block`] starting at an explicit instant.
    pub fn block_at(&self, key: K, now: Instant, duration: Duration) {
        let max_blocked = self.settings.load().max_blocked_clients;
        if !self.blocked.contains_key(&key) && self.blocked.len() >= max_blocked {
            self.blocked.retain(|_, expiry| *expiry > now);
            if self.blocked.len() >= max_blocked {
                tracing::warn!(limiter = %self.name, client = %key, "Blocked client limit reached, not blocking");
                return;
            }
        }

        tracing::info!(
            limiter = %self.name,
            kind = %K::KIND,
            client = %key,
            duration_secs = duration.as_secs(),
            "Blocking client after repeated authentication failures"
        );
        metrics::record_client_blocked(&self.name);
        self.blocked.insert(key, block_deadline(now, duration));
    }

    /// Number of keys with a failure history.
    pub fn tracked_clients(&self) -> usize {
        self.failures.len()
    }

    /// Number of keys with a block entry (expired entries included until purged).
    pub fn blocked_clients(&self) -> usize {
        self.blocked.len()
    }

    fn purge_stale_failures(&self, now: Instant, window: Duration) {
        self.failures.retain(|_, history| {
            prune(history, now, window);
            !history.is_empty()
        });
    }
}

impl<K: ClientKey> FailureListener<K> for RateLimiter<K> {
    fn record_failure(&self, key: &K) -> bool {
        self.record_failure_at(key, Instant::now())
    }

    fn current_count(&self, key: &K) -> usize {
        self.current_count_at(key, Instant::now())
    }
}

impl<K: ClientKey> ClientBlockRegistry<K> for RateLimiter<K> {
    fn is_blocked(&self, key: &K) -> bool {
        self.is_blocked_at(key, Instant::now())
    }

    fn block(&self, key: K, duration: Duration) {
        self.block_at(key, Instant::now(), duration);
    }

    fn key_kind(&self) -> KeyKind {
        K::KIND
    }
}

/// `now + duration`, saturating to a far-future instant instead of panicking.
fn block_deadline(now: Instant, duration: Duration) -> Instant {
    const CENTURY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);
    const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    now.checked_add(duration)
        .or_else(|| now.checked_add(CENTURY))
        .or_else(|| now.checked_add(YEAR))
        .unwrap_or(now)
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = history.front() {
        if now.saturating_duration_since(*oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}
