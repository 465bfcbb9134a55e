//! Monitor action dispatch
//!
//! Turns an Ingress' metadata plus one resolved host into a single-item
//! monitor batch and interprets the service's answer.

use crate::apis::metrics::record_monitor_action;
use crate::error::OperatorError;
use crate::monitor::labels::{LabelDomain, URL_FIELD};
use crate::monitor::service::{result_error, MonitorAction, MonitorService};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Dispatches monitor actions to a [`MonitorService`]
#[derive(Clone)]
pub struct MonitorDispatcher {
    service: Arc<dyn MonitorService>,
    domain: LabelDomain,
}

impl MonitorDispatcher {
    pub fn new(service: Arc<dyn MonitorService>, domain: LabelDomain) -> Self {
        Self { service, domain }
    }

    pub fn domain(&self) -> &LabelDomain {
        &self.domain
    }

    /// Send one monitor action for `host`
    ///
    /// An explicit `url` attribute in the metadata wins over `host`. Only the
    /// first result is inspected; an empty result list counts as success.
    /// Nothing is retried here.
    pub async fn dispatch(
        &self,
        host: &str,
        source: Option<&BTreeMap<String, String>>,
        action: MonitorAction,
    ) -> Result<(), OperatorError> {
        let mut attributes = match self.domain.project(source) {
            Ok(attributes) => attributes,
            Err(e) => {
                record_monitor_action(action, "invalid");
                return Err(e);
            }
        };
        attributes
            .entry(URL_FIELD.to_string())
            .or_insert_with(|| host.to_string());

        debug!(
            action = %action,
            host = host,
            attributes = attributes.len(),
            "Dispatching monitor action"
        );

        let results = self.service.handle_request(vec![attributes], action).await;

        match results.first().and_then(result_error) {
            Some(message) => {
                record_monitor_action(action, "error");
                Err(OperatorError::Dispatch {
                    host: host.to_string(),
                    message,
                })
            }
            None => {
                record_monitor_action(action, "success");
                Ok(())
            }
        }
    }
}
