//! HTTP-backed Monitor Service
//!
//! Posts each batch as JSON to a monitor gateway and decodes the per-item
//! results:
//!
//! ```text
//! POST /monitors
//! {"action": "update", "items": [{"url": "https://shop.example.com", "type": "HTTP"}]}
//!
//! 200 OK
//! [{"error": null}]
//! ```
//!
//! Transport failures are reported as item errors so the dispatcher treats
//! them like any other rejected monitor.

use crate::error::OperatorError;
use crate::monitor::labels::MonitorAttributes;
use crate::monitor::service::{error_result, ActionResult, MonitorAction, MonitorService};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct MonitorBatch<'a> {
    action: MonitorAction,
    items: &'a [MonitorAttributes],
}

/// Monitor service reached over plain HTTP
pub struct HttpMonitorService {
    client: Client<HttpConnector, Full<Bytes>>,
    endpoint: Uri,
    timeout: Duration,
}

impl HttpMonitorService {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, OperatorError> {
        let endpoint: Uri = endpoint.parse().map_err(|e| {
            OperatorError::Config(format!("invalid monitor service URL '{}': {}", endpoint, e))
        })?;

        if endpoint.scheme_str() != Some("http") || endpoint.host().is_none() {
            return Err(OperatorError::Config(format!(
                "monitor service URL must be http://host[:port]/path, got '{}'",
                endpoint
            )));
        }

        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            endpoint,
            timeout,
        })
    }

    async fn send(
        &self,
        items: &[MonitorAttributes],
        action: MonitorAction,
    ) -> Result<Vec<ActionResult>, OperatorError> {
        let body = serde_json::to_vec(&MonitorBatch { action, items })
            .map_err(|e| OperatorError::Transport(format!("failed to encode batch: {}", e)))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| OperatorError::Transport(format!("failed to build request: {}", e)))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| {
                OperatorError::Transport(format!(
                    "request to {} timed out after {:?}",
                    self.endpoint, self.timeout
                ))
            })?
            .map_err(|e| {
                OperatorError::Transport(format!("request to {} failed: {}", self.endpoint, e))
            })?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| OperatorError::Transport(format!("failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(OperatorError::Transport(format!(
                "monitor service returned {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            OperatorError::Transport(format!("invalid monitor service response: {}", e))
        })
    }
}

#[async_trait]
impl MonitorService for HttpMonitorService {
    async fn handle_request(
        &self,
        items: Vec<MonitorAttributes>,
        action: MonitorAction,
    ) -> Vec<ActionResult> {
        match self.send(&items, action).await {
            Ok(results) => {
                debug!(
                    action = %action,
                    items = items.len(),
                    results = results.len(),
                    "Monitor service answered"
                );
                results
            }
            Err(e) => {
                warn!(action = %action, error = %e, "Monitor service request failed");
                items.iter().map(|_| error_result(e.to_string())).collect()
            }
        }
    }
}
