//! Publication of snapshots to request threads.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::auth::alias::AliasRegistry;
use crate::auth::backend::BackendFactory;
use crate::config::DynamicConfig;
use crate::limiting::ListenerStore;
use crate::observability::metrics;
use crate::snapshot::builder::SnapshotBuilder;
use crate::snapshot::error::ConfigurationError;
use crate::snapshot::model::ConfigSnapshot;

struct WriterState {
    store: ListenerStore,
    generation: u64,
}

/// Holds the live [`ConfigSnapshot`] and replaces it on reload.
///
/// Readers call [`current`](Self::current) and keep the returned `Arc` for the
/// whole request. Reloads are serialized; a reload that fails leaves the live
/// snapshot and every limiter counter untouched.
pub struct ConfigManager {
    registry: Arc<AliasRegistry>,
    factory: Arc<dyn BackendFactory>,
    current: ArcSwap<ConfigSnapshot>,
    writer: Mutex<WriterState>,
}

impl ConfigManager {
    /// Start at generation 0 with the empty snapshot.
    pub fn new(registry: Arc<AliasRegistry>, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            registry,
            factory,
            current: ArcSwap::from_pointee(ConfigSnapshot::empty()),
            writer: Mutex::new(WriterState {
                store: ListenerStore::new(),
                generation: 0,
            }),
        }
    }

    /// The live snapshot.
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn registry(&self) -> &AliasRegistry {
        &self.registry
    }

    /// Build a snapshot from `config` and publish it.
    pub fn reload(&self, config: &DynamicConfig) -> Result<Arc<ConfigSnapshot>, ConfigurationError> {
        // A panic mid-build never touches the store before reconcile, so the
        // state behind a poisoned lock is still consistent.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = writer.generation + 1;

        let builder = SnapshotBuilder::new(&self.registry, self.factory.as_ref());
        match builder.build(config, &mut writer.store, generation) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.current.store(snapshot.clone());
                writer.generation = generation;

                tracing::info!(
                    generation,
                    rest_domains = snapshot.rest_auth_domains().len(),
                    transport_domains = snapshot.transport_auth_domains().len(),
                    authorizers = snapshot.rest_authorizers().len(),
                    listeners = writer.store.len(),
                    "Security configuration applied"
                );
                metrics::record_reload(true);
                metrics::record_generation(generation);
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    generation = writer.generation,
                    "Security configuration rejected, keeping current snapshot"
                );
                metrics::record_reload(false);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::builtin::BuiltinFactory;
    use crate::config::{AuthcDomainConfig, BackendConfig};

    fn manager() -> ConfigManager {
        ConfigManager::new(Arc::new(AliasRegistry::builtin()), Arc::new(BuiltinFactory::new()))
    }

    fn noop_config() -> DynamicConfig {
        let mut config = DynamicConfig::default();
        config.authc.insert(
            "noop".into(),
            AuthcDomainConfig {
                authentication_backend: BackendConfig::named("noop"),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_generations_increase() {
        let manager = manager();
        assert_eq!(manager.current().generation(), 0);

        manager.reload(&noop_config()).unwrap();
        let second = manager.reload(&noop_config()).unwrap();
        assert_eq!(second.generation(), 2);
        assert!(Arc::ptr_eq(&second, &manager.current()));
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let manager = manager();
        let live = manager.reload(&noop_config()).unwrap();

        let mut broken = noop_config();
        broken.authc.get_mut("noop").unwrap().http_authenticator.kind = "radius".into();
        assert!(manager.reload(&broken).is_err());
        assert!(Arc::ptr_eq(&live, &manager.current()));

        // the rejected attempt does not consume a generation
        assert_eq!(manager.reload(&noop_config()).unwrap().generation(), 2);
    }
}
