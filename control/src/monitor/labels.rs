//! Label projection
//!
//! Derives monitor attributes from an Ingress' labels (or annotations) by
//! stripping the configured domain prefix, and reads the enable flag.
//!
//! ## Metadata Format
//!
//! ```yaml
//! metadata:
//!   labels:
//!     my.domain/uptimerobot-monitor: "true"                    # enable flag
//!     my.domain/uptimerobot-monitor-type: HTTP                 # -> type
//!     my.domain/uptimerobot-monitor-friendly_name: storefront  # -> friendly_name
//! ```

use crate::error::OperatorError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Domain used when none is configured
pub const DEFAULT_DOMAIN: &str = "my.domain";

/// Fixed suffix appended to the domain to form the enable key
pub const LABEL_SUFFIX: &str = "uptimerobot-monitor";

/// Attribute carrying the monitored URL
pub const URL_FIELD: &str = "url";

/// Attribute carrying the human readable monitor name
pub const FRIENDLY_NAME_FIELD: &str = "friendly_name";

/// Desired monitor configuration (attribute name -> value)
pub type MonitorAttributes = BTreeMap<String, String>;

/// Enable flag value that is not a boolean literal
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid boolean literal '{0}'")]
pub(crate) struct BooleanParseError(String);

/// Parse a boolean literal (1/t/T/TRUE/true/True and their false forms)
pub(crate) fn parse_bool(value: &str) -> Result<bool, BooleanParseError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(BooleanParseError(other.to_string())),
    }
}

/// Label domain configuration
///
/// The enable key is `<domain>/uptimerobot-monitor`; attribute keys carry
/// the enable key plus a trailing `-`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDomain {
    enable_key: String,
    attribute_prefix: String,
}

impl LabelDomain {
    pub fn new(domain: &str) -> Self {
        let domain = if domain.is_empty() {
            DEFAULT_DOMAIN
        } else {
            domain
        };
        let enable_key = format!("{}/{}", domain, LABEL_SUFFIX);
        let attribute_prefix = format!("{}-", enable_key);
        Self {
            enable_key,
            attribute_prefix,
        }
    }

    /// Key holding the enable flag
    pub fn enable_key(&self) -> &str {
        &self.enable_key
    }

    /// Prefix every projected attribute key carries
    pub fn attribute_prefix(&self) -> &str {
        &self.attribute_prefix
    }

    /// Full metadata key for an attribute
    pub fn attribute_key(&self, attribute: &str) -> String {
        format!("{}{}", self.attribute_prefix, attribute)
    }

    /// Project prefixed metadata keys into monitor attributes
    ///
    /// Fails with [`OperatorError::MissingSource`] when there is no metadata
    /// at all. Metadata without any prefixed key yields an empty map.
    pub fn project(
        &self,
        source: Option<&BTreeMap<String, String>>,
    ) -> Result<MonitorAttributes, OperatorError> {
        let source = match source {
            Some(map) if !map.is_empty() => map,
            _ => return Err(OperatorError::MissingSource),
        };

        Ok(source
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(self.attribute_prefix.as_str())
                    .map(|attribute| (attribute.to_string(), value.clone()))
            })
            .collect())
    }

    /// Whether the metadata opts in to monitoring
    pub fn is_enabled(&self, source: Option<&BTreeMap<String, String>>) -> bool {
        source
            .and_then(|map| map.get(&self.enable_key))
            .map(|value| parse_bool(value).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Monitor friendly name, used to identify the monitor in logs
    pub fn friendly_name<'a>(
        &self,
        source: Option<&'a BTreeMap<String, String>>,
    ) -> Option<&'a str> {
        source
            .and_then(|map| map.get(&self.attribute_key(FRIENDLY_NAME_FIELD)))
            .map(String::as_str)
    }
}

impl Default for LabelDomain {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN)
    }
}

/// Metadata map that describes the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    #[default]
    Labels,
    Annotations,
}

impl MetadataSource {
    /// Pick the configured map out of an object's metadata
    pub fn select<'a>(&self, meta: &'a ObjectMeta) -> Option<&'a BTreeMap<String, String>> {
        match self {
            MetadataSource::Labels => meta.labels.as_ref(),
            MetadataSource::Annotations => meta.annotations.as_ref(),
        }
    }
}

impl FromStr for MetadataSource {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "labels" => Ok(MetadataSource::Labels),
            "annotations" => Ok(MetadataSource::Annotations),
            other => Err(OperatorError::Config(format!(
                "unknown metadata source '{}' (expected labels or annotations)",
                other
            ))),
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSource::Labels => write!(f, "labels"),
            MetadataSource::Annotations => write!(f, "annotations"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_domain_keys() {
        let domain = LabelDomain::default();
        assert_eq!(domain.enable_key(), "my.domain/uptimerobot-monitor");
        assert_eq!(domain.attribute_prefix(), "my.domain/uptimerobot-monitor-");
        assert_eq!(LabelDomain::new(""), domain);
    }

    #[test]
    fn test_project_rejects_missing_metadata() {
        let domain = LabelDomain::default();

        assert!(matches!(
            domain.project(None),
            Err(OperatorError::MissingSource)
        ));
        assert!(matches!(
            domain.project(Some(&BTreeMap::new())),
            Err(OperatorError::MissingSource)
        ));
    }

    #[test]
    fn test_project_without_prefixed_keys_is_empty() {
        let domain = LabelDomain::default();
        let source = metadata(&[("app", "storefront"), ("team", "web")]);

        let attributes = domain.project(Some(&source)).expect("Should project");
        assert!(attributes.is_empty());
    }

    #[test]
    fn test_project_strips_prefix() {
        let domain = LabelDomain::default();
        let source = metadata(&[
            ("my.domain/uptimerobot-monitor", "true"),
            ("my.domain/uptimerobot-monitor-type", "HTTP"),
            ("app", "storefront"),
        ]);

        let attributes = domain.project(Some(&source)).expect("Should project");
        assert_eq!(attributes, metadata(&[("type", "HTTP")]));
    }

    #[test]
    fn test_project_ignores_other_domains() {
        let domain = LabelDomain::new("example.com");
        let source = metadata(&[
            ("my.domain/uptimerobot-monitor-type", "HTTP"),
            ("example.com/uptimerobot-monitor-interval", "300"),
        ]);

        let attributes = domain.project(Some(&source)).expect("Should project");
        assert_eq!(attributes, metadata(&[("interval", "300")]));
    }

    #[test]
    fn test_enable_flag_parsing() {
        let domain = LabelDomain::default();
        let key = domain.enable_key();

        assert!(domain.is_enabled(Some(&metadata(&[(key, "true")]))));
        assert!(domain.is_enabled(Some(&metadata(&[(key, "1")]))));
        assert!(!domain.is_enabled(Some(&metadata(&[(key, "false")]))));
        assert!(
            !domain.is_enabled(Some(&metadata(&[(key, "falser")]))),
            "Unparsable values disable monitoring"
        );
        assert!(!domain.is_enabled(Some(&metadata(&[("app", "web")]))));
        assert!(!domain.is_enabled(None));
    }

    #[test]
    fn test_enable_flag_is_not_an_attribute() {
        let domain = LabelDomain::default();
        // The trailing "-" keeps the enable key out of the projection
        let source = metadata(&[(domain.enable_key(), "true")]);

        let attributes = domain.project(Some(&source)).expect("Should project");
        assert!(attributes.is_empty());
    }

    #[test]
    fn test_parse_bool_literals() {
        for literal in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(literal), Ok(true), "{}", literal);
        }
        for literal in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(literal), Ok(false), "{}", literal);
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_friendly_name_lookup() {
        let domain = LabelDomain::default();
        let source = metadata(&[("my.domain/uptimerobot-monitor-friendly_name", "storefront")]);

        assert_eq!(domain.friendly_name(Some(&source)), Some("storefront"));
        assert_eq!(domain.friendly_name(None), None);
    }

    #[test]
    fn test_metadata_source_select() {
        let meta = ObjectMeta {
            labels: Some(metadata(&[("from", "labels")])),
            annotations: Some(metadata(&[("from", "annotations")])),
            ..Default::default()
        };

        let labels = MetadataSource::Labels.select(&meta).expect("labels");
        assert_eq!(labels.get("from").map(String::as_str), Some("labels"));

        let annotations = MetadataSource::Annotations.select(&meta).expect("annotations");
        assert_eq!(annotations.get("from").map(String::as_str), Some("annotations"));

        assert_eq!("Annotations".parse::<MetadataSource>().ok(), Some(MetadataSource::Annotations));
    }
}
