//! Host/scheme resolution
//!
//! Computes which URLs an Ingress exposes: every rule host is served over
//! `http`, every host listed in a TLS entry over `https`. TLS always wins.

use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;
use std::fmt;

/// URL scheme a host is monitored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Compose `scheme://host`
    pub fn url_for(&self, host: &str) -> String {
        format!("{}://{}", self, host)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// Hostname -> scheme, one entry per host
pub type HostSchemeMap = BTreeMap<String, Scheme>;

/// Resolve the hosts an Ingress exposes
pub fn resolve_hosts(ingress: &Ingress) -> HostSchemeMap {
    let mut hosts = HostSchemeMap::new();

    let Some(spec) = ingress.spec.as_ref() else {
        return hosts;
    };

    for rule in spec.rules.iter().flatten() {
        if let Some(host) = rule.host.as_deref().filter(|h| !h.is_empty()) {
            hosts.insert(host.to_string(), Scheme::Http);
        }
    }

    // Runs after the rule pass so TLS overrides plain hosts
    for tls in spec.tls.iter().flatten() {
        for host in tls.hosts.iter().flatten().filter(|h| !h.is_empty()) {
            hosts.insert(host.clone(), Scheme::Https);
        }
    }

    hosts
}
