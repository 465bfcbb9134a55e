//! Configuration for the uptime controller
//!
//! Resolved once at startup from environment variables and injected into
//! the label projector, event filter and reconciler.

use crate::error::OperatorError;
use crate::monitor::labels::{LabelDomain, MetadataSource, DEFAULT_DOMAIN};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable selecting the label/annotation domain
pub const DOMAIN_LABEL_PREFIX_ENV: &str = "DOMAIN_LABEL_PREFIX";

/// Controller configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Domain used for the enable key and the attribute prefix
    #[serde(default = "default_label_domain")]
    pub label_domain: String,

    /// Which metadata map (labels or annotations) describes the monitor
    #[serde(default)]
    pub metadata_source: MetadataSource,

    /// Namespace to watch (None = all namespaces)
    pub watch_namespace: Option<String>,

    /// Address serving /metrics and /healthz (None = disabled)
    #[serde(default = "default_metrics_bind_addr")]
    pub metrics_bind_addr: Option<String>,

    /// Monitor service backend
    #[serde(default)]
    pub monitor_service: MonitorServiceConfig,

    /// Reconcile loop tuning
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Monitor service backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorServiceConfig {
    /// HTTP endpoint receiving monitor batches (None = dry run)
    pub url: Option<String>,

    /// Per-request timeout in seconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for MonitorServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Reconcile loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Delay before a failed reconciliation is retried (default: 60s)
    #[serde(default = "default_retry")]
    pub retry_secs: u64,

    /// Interval between full resyncs of known Ingresses (default: 300s, 0 = off)
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Pending deletions held by the cleanup queue (default: 64)
    #[serde(default = "default_cleanup_queue_capacity")]
    pub cleanup_queue_capacity: usize,
}

fn default_retry() -> u64 {
    60
}

fn default_resync_interval() -> u64 {
    300
}

fn default_cleanup_queue_capacity() -> usize {
    64
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            retry_secs: default_retry(),
            resync_interval_secs: default_resync_interval(),
            cleanup_queue_capacity: default_cleanup_queue_capacity(),
        }
    }
}

impl ReconcileConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }

    /// Resync period; `None` when resync is turned off
    pub fn resync_interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.resync_interval_secs)).filter(|d| !d.is_zero())
    }
}

fn default_metrics_bind_addr() -> Option<String> {
    Some("0.0.0.0:9090".to_string())
}

fn default_label_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            label_domain: default_label_domain(),
            metadata_source: MetadataSource::default(),
            watch_namespace: None,
            metrics_bind_addr: default_metrics_bind_addr(),
            monitor_service: MonitorServiceConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, OperatorError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OperatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // An empty domain falls back to the default, same as an unset one
        if let Some(val) = lookup(DOMAIN_LABEL_PREFIX_ENV).filter(|v| !v.is_empty()) {
            config.label_domain = val;
        }

        if let Some(val) = lookup("MONITOR_METADATA_SOURCE") {
            config.metadata_source = val.parse()?;
        }

        if let Some(val) = lookup("WATCH_NAMESPACE").filter(|v| !v.is_empty()) {
            config.watch_namespace = Some(val);
        }

        // An empty address turns the metrics listener off
        if let Some(val) = lookup("METRICS_BIND_ADDR") {
            config.metrics_bind_addr = Some(val).filter(|v| !v.is_empty());
        }

        if let Some(val) = lookup("MONITOR_SERVICE_URL").filter(|v| !v.is_empty()) {
            config.monitor_service.url = Some(val);
        }

        if let Some(secs) = parse_var(&lookup, "MONITOR_REQUEST_TIMEOUT_SECS")? {
            config.monitor_service.request_timeout_secs = secs;
        }

        if let Some(secs) = parse_var(&lookup, "RECONCILE_RETRY_SECS")? {
            config.reconcile.retry_secs = secs;
        }

        if let Some(secs) = parse_var(&lookup, "RESYNC_INTERVAL_SECS")? {
            config.reconcile.resync_interval_secs = secs;
        }

        if let Some(capacity) = parse_var::<usize, _>(&lookup, "CLEANUP_QUEUE_CAPACITY")? {
            if capacity == 0 {
                return Err(OperatorError::Config(
                    "CLEANUP_QUEUE_CAPACITY must be greater than zero".to_string(),
                ));
            }
            config.reconcile.cleanup_queue_capacity = capacity;
        }

        Ok(config)
    }

    /// Label domain as an injectable value
    pub fn domain(&self) -> LabelDomain {
        LabelDomain::new(&self.label_domain)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, OperatorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| OperatorError::Config(format!("invalid {} '{}': {}", name, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ControllerConfig::default();
        assert_eq!(config.label_domain, "my.domain");
        assert_eq!(config.metadata_source, MetadataSource::Labels);
        assert!(config.watch_namespace.is_none());
        assert!(config.monitor_service.url.is_none());
        assert_eq!(config.metrics_bind_addr.as_deref(), Some("0.0.0.0:9090"));
    }

    #[test]
    fn test_reconcile_defaults() {
        let config = ControllerConfig::default();

        assert_eq!(
            config.reconcile.retry_secs, 60,
            "Failed reconciliations retry after 1 minute"
        );
        assert_eq!(
            config.reconcile.resync_interval_secs, 300,
            "Known Ingresses are resynced every 5 minutes"
        );
        assert_eq!(config.reconcile.cleanup_queue_capacity, 64);
        assert_eq!(config.monitor_service.request_timeout_secs, 30);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("DOMAIN_LABEL_PREFIX", "example.com"),
            ("MONITOR_METADATA_SOURCE", "annotations"),
            ("WATCH_NAMESPACE", "web"),
            ("MONITOR_SERVICE_URL", "http://monitor-gateway:8080/monitors"),
            ("RECONCILE_RETRY_SECS", "15"),
            ("CLEANUP_QUEUE_CAPACITY", "8"),
            ("METRICS_BIND_ADDR", ""),
        ]))
        .expect("Should load config");

        assert_eq!(config.label_domain, "example.com");
        assert_eq!(config.domain().enable_key(), "example.com/uptimerobot-monitor");
        assert_eq!(config.metadata_source, MetadataSource::Annotations);
        assert_eq!(config.watch_namespace.as_deref(), Some("web"));
        assert_eq!(
            config.monitor_service.url.as_deref(),
            Some("http://monitor-gateway:8080/monitors")
        );
        assert_eq!(config.reconcile.retry_delay(), Duration::from_secs(15));
        assert_eq!(config.reconcile.cleanup_queue_capacity, 8);
        assert!(config.metrics_bind_addr.is_none());
    }

    #[test]
    fn test_empty_domain_falls_back_to_default() {
        let config = ControllerConfig::from_lookup(lookup_from(&[("DOMAIN_LABEL_PREFIX", "")]))
            .expect("Should load config");
        assert_eq!(config.label_domain, "my.domain");
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result =
            ControllerConfig::from_lookup(lookup_from(&[("RESYNC_INTERVAL_SECS", "soon")]));
        assert!(matches!(result, Err(OperatorError::Config(_))));

        let result = ControllerConfig::from_lookup(lookup_from(&[("CLEANUP_QUEUE_CAPACITY", "0")]));
        assert!(matches!(result, Err(OperatorError::Config(_))));
    }

    #[test]
    fn test_zero_resync_interval_turns_resync_off() {
        let config = ControllerConfig::from_lookup(lookup_from(&[("RESYNC_INTERVAL_SECS", "0")]))
            .expect("Zero is a valid interval");
        assert_eq!(config.reconcile.resync_interval(), None);

        let config = ControllerConfig::default();
        assert_eq!(
            config.reconcile.resync_interval(),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_unknown_metadata_source_is_rejected() {
        let result =
            ControllerConfig::from_lookup(lookup_from(&[("MONITOR_METADATA_SOURCE", "spec")]));
        assert!(matches!(result, Err(OperatorError::Config(_))));
    }
}
