//! The immutable configuration snapshot read by request threads.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::domain::{AuthDomain, AuthorizerDomain, Protocol};
use crate::auth::xff::XffSettings;
use crate::config::{
    DashboardsConfig, FilteredAliasMode, HostsResolverMode, OnBehalfOfConfig, SignInOption,
};
use crate::limiting::{AddressRateLimiter, ClientLimiter};

/// Settings handed through to the dashboards application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardsSettings {
    /// Service account the dashboards server authenticates as.
    pub server_username: String,
    /// Role mapped to the service account, if any.
    pub opensearch_role: Option<String>,
    pub index: String,
    pub multitenancy_enabled: bool,
    pub private_tenant_enabled: bool,
    pub default_tenant: String,
}

impl From<&DashboardsConfig> for DashboardsSettings {
    fn from(config: &DashboardsConfig) -> Self {
        Self {
            server_username: config.server_username.clone(),
            opensearch_role: config.opensearch_role.clone(),
            index: config.index.clone(),
            multitenancy_enabled: config.multitenancy_enabled,
            private_tenant_enabled: config.private_tenant_enabled,
            default_tenant: config.default_tenant.clone(),
        }
    }
}

impl Default for DashboardsSettings {
    fn default() -> Self {
        Self::from(&DashboardsConfig::default())
    }
}

/// On-behalf-of credential settings, passed through untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OnBehalfOfSettings {
    pub enabled: bool,
    pub signing_key: Option<String>,
    pub encryption_key: Option<String>,
}

impl From<&OnBehalfOfConfig> for OnBehalfOfSettings {
    fn from(config: &OnBehalfOfConfig) -> Self {
        Self {
            enabled: config.enabled,
            signing_key: config.signing_key.clone(),
            encryption_key: config.encryption_key.clone(),
        }
    }
}

impl std::fmt::Debug for OnBehalfOfSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnBehalfOfSettings")
            .field("enabled", &self.enabled)
            .field("signing_key", &self.signing_key.as_ref().map(|_| "<redacted>"))
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One fully resolved configuration generation.
///
/// Built once by [`SnapshotBuilder`](crate::snapshot::SnapshotBuilder) and
/// never mutated. Request threads hold an `Arc` to one snapshot for the whole
/// request, so every accessor answers from the same generation.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub(crate) generation: u64,
    pub(crate) rest_auth_domains: Vec<Arc<AuthDomain>>,
    pub(crate) transport_auth_domains: Vec<Arc<AuthDomain>>,
    pub(crate) rest_authorizers: Vec<Arc<AuthorizerDomain>>,
    pub(crate) transport_authorizers: Vec<Arc<AuthorizerDomain>>,
    pub(crate) anonymous_auth_enabled: bool,
    pub(crate) xff: XffSettings,
    pub(crate) rest_auth_disabled: bool,
    pub(crate) inter_transport_auth_disabled: bool,
    pub(crate) respect_request_indices_enabled: bool,
    pub(crate) dnfof_enabled: bool,
    pub(crate) dnfof_for_empty_results_enabled: bool,
    pub(crate) multi_rolespan_enabled: bool,
    pub(crate) filtered_alias_mode: FilteredAliasMode,
    pub(crate) hosts_resolver_mode: HostsResolverMode,
    pub(crate) dashboards: DashboardsSettings,
    pub(crate) sign_in_options: Vec<SignInOption>,
    pub(crate) on_behalf_of: OnBehalfOfSettings,
    pub(crate) ip_limiters: Vec<Arc<AddressRateLimiter>>,
    pub(crate) backend_limiters: HashMap<String, Vec<ClientLimiter>>,
}

impl ConfigSnapshot {
    /// Generation 0: nothing configured, every request is denied.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            rest_auth_domains: Vec::new(),
            transport_auth_domains: Vec::new(),
            rest_authorizers: Vec::new(),
            transport_authorizers: Vec::new(),
            anonymous_auth_enabled: false,
            xff: XffSettings::default(),
            rest_auth_disabled: false,
            inter_transport_auth_disabled: false,
            respect_request_indices_enabled: false,
            dnfof_enabled: false,
            dnfof_for_empty_results_enabled: false,
            multi_rolespan_enabled: true,
            filtered_alias_mode: FilteredAliasMode::default(),
            hosts_resolver_mode: HostsResolverMode::default(),
            dashboards: DashboardsSettings::default(),
            sign_in_options: vec![SignInOption::Basic],
            on_behalf_of: OnBehalfOfSettings::default(),
            ip_limiters: Vec::new(),
            backend_limiters: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// REST domains, ascending by order.
    pub fn rest_auth_domains(&self) -> &[Arc<AuthDomain>] {
        &self.rest_auth_domains
    }

    /// Transport domains, ascending by order.
    pub fn transport_auth_domains(&self) -> &[Arc<AuthDomain>] {
        &self.transport_auth_domains
    }

    pub fn auth_domains(&self, protocol: Protocol) -> &[Arc<AuthDomain>] {
        match protocol {
            Protocol::Rest => &self.rest_auth_domains,
            Protocol::Transport => &self.transport_auth_domains,
        }
    }

    pub fn rest_authorizers(&self) -> &[Arc<AuthorizerDomain>] {
        &self.rest_authorizers
    }

    pub fn transport_authorizers(&self) -> &[Arc<AuthorizerDomain>] {
        &self.transport_authorizers
    }

    pub fn authorizers(&self, protocol: Protocol) -> &[Arc<AuthorizerDomain>] {
        match protocol {
            Protocol::Rest => &self.rest_authorizers,
            Protocol::Transport => &self.transport_authorizers,
        }
    }

    pub fn is_anonymous_authentication_enabled(&self) -> bool {
        self.anonymous_auth_enabled
    }

    pub fn is_xff_enabled(&self) -> bool {
        self.xff.is_enabled()
    }

    /// Trusted proxy pattern.
    pub fn internal_proxies(&self) -> &str {
        self.xff.internal_proxies()
    }

    pub fn remote_ip_header(&self) -> &str {
        self.xff.remote_ip_header()
    }

    pub fn xff(&self) -> &XffSettings {
        &self.xff
    }

    pub fn is_rest_auth_disabled(&self) -> bool {
        self.rest_auth_disabled
    }

    pub fn is_inter_transport_auth_disabled(&self) -> bool {
        self.inter_transport_auth_disabled
    }

    pub fn is_auth_disabled(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::Rest => self.rest_auth_disabled,
            Protocol::Transport => self.inter_transport_auth_disabled,
        }
    }

    pub fn is_respect_request_indices_enabled(&self) -> bool {
        self.respect_request_indices_enabled
    }

    pub fn is_dnfof_enabled(&self) -> bool {
        self.dnfof_enabled
    }

    pub fn is_dnfof_for_empty_results_enabled(&self) -> bool {
        self.dnfof_for_empty_results_enabled
    }

    pub fn is_multi_rolespan_enabled(&self) -> bool {
        self.multi_rolespan_enabled
    }

    pub fn filtered_alias_mode(&self) -> FilteredAliasMode {
        self.filtered_alias_mode
    }

    pub fn hosts_resolver_mode(&self) -> HostsResolverMode {
        self.hosts_resolver_mode
    }

    pub fn dashboards(&self) -> &DashboardsSettings {
        &self.dashboards
    }

    pub fn dashboards_server_username(&self) -> &str {
        &self.dashboards.server_username
    }

    pub fn dashboards_opensearch_role(&self) -> Option<&str> {
        self.dashboards.opensearch_role.as_deref()
    }

    pub fn dashboards_index_name(&self) -> &str {
        &self.dashboards.index
    }

    pub fn is_dashboards_multitenancy_enabled(&self) -> bool {
        self.dashboards.multitenancy_enabled
    }

    pub fn is_dashboards_private_tenant_enabled(&self) -> bool {
        self.dashboards.private_tenant_enabled
    }

    pub fn dashboards_default_tenant(&self) -> &str {
        &self.dashboards.default_tenant
    }

    pub fn sign_in_options(&self) -> &[SignInOption] {
        &self.sign_in_options
    }

    pub fn on_behalf_of_settings(&self) -> &OnBehalfOfSettings {
        &self.on_behalf_of
    }

    /// Global address limiters in their failure listener role.
    pub fn ip_auth_failure_listeners(&self) -> &[Arc<AddressRateLimiter>] {
        &self.ip_limiters
    }

    /// Global address limiters in their block registry role.
    pub fn ip_client_block_registries(&self) -> &[Arc<AddressRateLimiter>] {
        &self.ip_limiters
    }

    /// Backend-bound limiters in their failure listener role.
    pub fn auth_backend_failure_listeners(&self) -> &HashMap<String, Vec<ClientLimiter>> {
        &self.backend_limiters
    }

    /// Backend-bound limiters in their block registry role.
    pub fn auth_backend_client_block_registries(&self) -> &HashMap<String, Vec<ClientLimiter>> {
        &self.backend_limiters
    }

    /// Limiters bound to one backend.
    pub fn backend_limiters(&self, backend: &str) -> &[ClientLimiter] {
        self.backend_limiters
            .get(backend)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ConfigSnapshot::empty();
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.rest_auth_domains().is_empty());
        assert!(!snapshot.is_anonymous_authentication_enabled());
        assert_eq!(snapshot.remote_ip_header(), "X-Forwarded-For");
        assert_eq!(snapshot.dashboards_index_name(), ".kibana");
        assert!(snapshot.backend_limiters("ldap").is_empty());
    }

    #[test]
    fn test_on_behalf_of_debug_redacts_keys() {
        let settings = OnBehalfOfSettings {
            enabled: true,
            signing_key: Some("c2lnbmluZy1rZXk=".into()),
            encryption_key: None,
        };
        assert!(!format!("{settings:?}").contains("c2lnbmluZy1rZXk="));
    }
}
