//! Event filtering
//!
//! Decides which Ingress events lead to a reconciliation. Only Ingresses
//! carrying the enable flag are reconciled. Deletions are never reconciled:
//! the object is gone by the time a reconcile could fetch it, so an enabled
//! deletion is handed to the cleanup queue instead.

use crate::apis::ingress::cleanup::{CleanupHandle, CleanupTask};
use crate::apis::ingress::events::IngressEvent;
use crate::monitor::labels::{LabelDomain, MetadataSource};
use k8s_openapi::api::networking::v1::Ingress;
use tracing::debug;

/// Admission filter for Ingress events
pub struct EventFilter {
    domain: LabelDomain,
    source: MetadataSource,
    cleanup: CleanupHandle,
}

impl EventFilter {
    pub fn new(domain: LabelDomain, source: MetadataSource, cleanup: CleanupHandle) -> Self {
        Self {
            domain,
            source,
            cleanup,
        }
    }

    /// Whether the event should be reconciled
    pub fn admit(&self, event: &IngressEvent) -> bool {
        match event {
            IngressEvent::Created(obj) | IngressEvent::Generic(obj) => {
                self.is_enabled(obj.as_deref())
            }
            IngressEvent::Updated { new, .. } => self.is_enabled(new.as_deref()),
            IngressEvent::Deleted(obj) => {
                if let Some(ingress) = obj.as_deref() {
                    if self.is_enabled(Some(ingress)) {
                        let task = CleanupTask::from_ingress(ingress, self.source);
                        debug!("Queueing monitor cleanup for deleted Ingress {}", task.key);
                        self.cleanup.submit(task);
                    }
                }
                false
            }
        }
    }

    fn is_enabled(&self, ingress: Option<&Ingress>) -> bool {
        ingress
            .map(|ingress| self.domain.is_enabled(self.source.select(&ingress.metadata)))
            .unwrap_or(false)
    }
}
