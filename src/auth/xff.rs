//! Client address resolution behind trusted proxies.

use std::net::IpAddr;

use regex::Regex;

use crate::auth::backend::{AuthRequest, RequestContext};
use crate::config::XffConfig;

/// Compiled X-Forwarded-For settings.
#[derive(Debug, Clone)]
pub struct XffSettings {
    enabled: bool,
    internal_proxies: String,
    remote_ip_header: String,
    trusted: Regex,
}

impl XffSettings {
    /// Compile the trusted proxy pattern; it must match whole addresses.
    pub fn new(config: &XffConfig) -> Result<Self, regex::Error> {
        let trusted = Regex::new(&format!("^(?:{})$", config.internal_proxies))?;
        Ok(Self {
            enabled: config.enabled,
            internal_proxies: config.internal_proxies.clone(),
            remote_ip_header: config.remote_ip_header.clone(),
            trusted,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The trusted proxy pattern as configured.
    pub fn internal_proxies(&self) -> &str {
        &self.internal_proxies
    }

    pub fn remote_ip_header(&self) -> &str {
        &self.remote_ip_header
    }

    pub fn is_trusted_proxy(&self, address: &str) -> bool {
        self.trusted.is_match(address.trim())
    }

    /// Work out who the client is.
    ///
    /// When the direct peer is a trusted proxy, the header chain is walked
    /// from the right, skipping further trusted proxies.
    pub fn resolve<'a>(&self, request: &'a AuthRequest) -> RequestContext<'a> {
        let direct = RequestContext::direct(request);
        if !self.enabled || !self.is_trusted_proxy(&request.remote_address.to_string()) {
            return direct;
        }
        let Some(chain) = request.header(&self.remote_ip_header) else {
            return direct;
        };

        let hops: Vec<&str> = chain
            .split(',')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();
        let client = hops
            .iter()
            .rev()
            .find(|hop| !self.is_trusted_proxy(hop))
            .or_else(|| hops.first());

        match client.map(|hop| hop.parse::<IpAddr>()) {
            Some(Ok(address)) => RequestContext {
                request,
                client_address: address,
                via_trusted_proxy: true,
            },
            Some(Err(_)) => {
                tracing::debug!(header = %self.remote_ip_header, value = %chain, "Unparseable forwarded address");
                direct
            }
            None => direct,
        }
    }
}

impl Default for XffSettings {
    fn default() -> Self {
        Self::new(&XffConfig::default()).expect("default trusted proxy pattern compiles")
    }
}
