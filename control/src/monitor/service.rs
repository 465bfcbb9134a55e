//! Monitor Service boundary
//!
//! The backend that actually creates, updates or deletes uptime monitors.
//! It receives a batch of attribute maps plus an action and answers with one
//! result map per item; a failed item carries its message under
//! [`ERROR_RESULT_FIELD`].

use crate::monitor::labels::{MonitorAttributes, FRIENDLY_NAME_FIELD, URL_FIELD};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::info;

/// Result map key carrying a per-item error
pub const ERROR_RESULT_FIELD: &str = "error";

/// Outcome of one item in a monitor batch
pub type ActionResult = Map<String, Value>;

/// Monitor action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorAction {
    /// Create the monitor, or update it if it already exists
    Update,
    Delete,
}

impl fmt::Display for MonitorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorAction::Update => write!(f, "update"),
            MonitorAction::Delete => write!(f, "delete"),
        }
    }
}

/// External service managing uptime monitors
#[async_trait]
pub trait MonitorService: Send + Sync {
    async fn handle_request(
        &self,
        items: Vec<MonitorAttributes>,
        action: MonitorAction,
    ) -> Vec<ActionResult>;
}

/// Error message carried by a result, if any
///
/// Null and empty values count as success.
pub fn result_error(result: &ActionResult) -> Option<String> {
    match result.get(ERROR_RESULT_FIELD)? {
        Value::Null => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

/// Build a result map reporting a failure
pub fn error_result(message: impl Into<String>) -> ActionResult {
    let mut result = Map::new();
    result.insert(
        ERROR_RESULT_FIELD.to_string(),
        Value::String(message.into()),
    );
    result
}

/// Monitor service that only logs what it would do
///
/// Used when no backend endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct DryRunMonitorService;

#[async_trait]
impl MonitorService for DryRunMonitorService {
    async fn handle_request(
        &self,
        items: Vec<MonitorAttributes>,
        action: MonitorAction,
    ) -> Vec<ActionResult> {
        items
            .iter()
            .map(|item| {
                info!(
                    action = %action,
                    url = item.get(URL_FIELD).map(String::as_str).unwrap_or(""),
                    friendly_name = item.get(FRIENDLY_NAME_FIELD).map(String::as_str).unwrap_or(""),
                    attributes = item.len(),
                    "Dry run: monitor request not sent"
                );
                Map::new()
            })
            .collect()
    }
}
