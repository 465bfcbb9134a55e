//! Ingress reconciler
//!
//! Watches Ingress resources and keeps one uptime monitor per exposed host.
//!
//! ## Flow
//!
//! 1. The watcher reports Ingress changes
//! 2. [`EventTranslator`] turns them into create/update/delete/generic events
//! 3. [`EventFilter`] admits enabled Ingresses (deletions go to cleanup)
//! 4. [`IngressReconciler::reconcile`] fetches the Ingress and creates or
//!    updates a monitor for each `scheme://host`
//!
//! Reconciliations run one at a time. A failed fetch is retried after the
//! configured delay; a failed monitor dispatch is logged and not retried.

use crate::apis::ingress::cleanup::CleanupQueue;
use crate::apis::ingress::events::{EventTranslator, IngressEvent, IngressKey};
use crate::apis::ingress::filter::EventFilter;
use crate::apis::ingress::hosts::resolve_hosts;
use crate::apis::metrics::record_ingress_reconciliation;
use crate::config::ControllerConfig;
use crate::error::OperatorError;
use crate::monitor::dispatcher::MonitorDispatcher;
use crate::monitor::labels::MetadataSource;
use crate::monitor::service::{MonitorAction, MonitorService};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::Api;
use kube::runtime::watcher;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::WatchStreamExt;
use kube::Client;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Read access to Ingresses
#[async_trait]
pub trait IngressStore: Send + Sync {
    /// Fetch an Ingress; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, OperatorError>;
}

#[async_trait]
impl IngressStore for Client {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, OperatorError> {
        let api: Api<Ingress> = Api::namespaced(self.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

/// Watch Ingresses in one namespace, or all of them
pub fn watch_ingresses(
    client: Client,
    namespace: Option<&str>,
) -> impl Stream<Item = Result<watcher::Event<Ingress>, watcher::Error>> + Send {
    let api: Api<Ingress> = match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    watcher(api, WatcherConfig::default()).default_backoff()
}

/// Ingress reconciler
pub struct IngressReconciler {
    store: Arc<dyn IngressStore>,
    dispatcher: MonitorDispatcher,
    source: MetadataSource,
}

impl IngressReconciler {
    pub fn new(
        store: Arc<dyn IngressStore>,
        dispatcher: MonitorDispatcher,
        source: MetadataSource,
    ) -> Self {
        Self {
            store,
            dispatcher,
            source,
        }
    }

    /// Reconcile a single Ingress
    ///
    /// Only a failed fetch is returned as an error. A monitor that cannot be
    /// created stops the remaining hosts but still counts as reconciled.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<(), OperatorError> {
        let start = Instant::now();

        info!("Reconciling Ingress: {}/{}", namespace, name);

        let ingress = match self.store.get(namespace, name).await {
            Ok(Some(ingress)) => ingress,
            Ok(None) => {
                debug!("Ingress {}/{} no longer exists, nothing to do", namespace, name);
                record_ingress_reconciliation(
                    namespace,
                    start.elapsed().as_secs_f64(),
                    "not_found",
                );
                return Ok(());
            }
            Err(e) => {
                record_ingress_reconciliation(namespace, start.elapsed().as_secs_f64(), "error");
                return Err(e);
            }
        };

        let hosts = resolve_hosts(&ingress);
        let metadata = self.source.select(&ingress.metadata);

        debug!(
            "Ingress {}/{} exposes {} host(s)",
            namespace,
            name,
            hosts.len()
        );

        for (host, scheme) in &hosts {
            let url = scheme.url_for(host);
            match self
                .dispatcher
                .dispatch(&url, metadata, MonitorAction::Update)
                .await
            {
                Ok(()) => info!("Monitor {} successfully created/updated", url),
                Err(e) => {
                    error!(
                        ingress = %format!("{}/{}", namespace, name),
                        "Monitor {} not successfully created/updated: {}",
                        url, e
                    );
                    record_ingress_reconciliation(
                        namespace,
                        start.elapsed().as_secs_f64(),
                        "dispatch_failed",
                    );
                    return Ok(());
                }
            }
        }

        record_ingress_reconciliation(namespace, start.elapsed().as_secs_f64(), "success");
        Ok(())
    }
}

/// Ingress controller: watch loop, filter, reconciler and cleanup queue
pub struct IngressController {
    reconciler: IngressReconciler,
    filter: EventFilter,
    cleanup: CleanupQueue,
    translator: EventTranslator,
    retry_delay: Duration,
    resync_interval: Option<Duration>,
}

impl IngressController {
    /// Build the controller; spawns the cleanup worker on the current runtime
    pub fn new(
        store: Arc<dyn IngressStore>,
        service: Arc<dyn MonitorService>,
        config: &ControllerConfig,
    ) -> Self {
        let dispatcher = MonitorDispatcher::new(service, config.domain());
        let (cleanup, handle) =
            CleanupQueue::start(dispatcher.clone(), config.reconcile.cleanup_queue_capacity);

        Self {
            reconciler: IngressReconciler::new(store, dispatcher, config.metadata_source),
            filter: EventFilter::new(config.domain(), config.metadata_source, handle),
            cleanup,
            translator: EventTranslator::new(),
            retry_delay: config.reconcile.retry_delay(),
            resync_interval: config.reconcile.resync_interval(),
        }
    }

    /// Run until `shutdown` completes or the event stream ends
    ///
    /// Queued cleanups are drained before returning.
    pub async fn run<S, F>(self, events: S, shutdown: F)
    where
        S: Stream<Item = Result<watcher::Event<Ingress>, watcher::Error>>,
        F: Future<Output = ()>,
    {
        let Self {
            reconciler,
            filter,
            cleanup,
            mut translator,
            retry_delay,
            resync_interval,
        } = self;

        futures::pin_mut!(events);
        tokio::pin!(shutdown);

        let (mut retries, mut retry_rx) = RetryQueue::new(retry_delay);

        // Without a resync period the branch stays disabled; the timer still needs one
        let period = resync_interval.unwrap_or(Duration::from_secs(3600));
        let mut resync = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        info!("Starting Ingress controller");

        loop {
            tokio::select! {
                event = events.next() => {
                    match event {
                        Some(Ok(event)) => {
                            for ingress_event in translator.translate(event) {
                                admit_and_reconcile(
                                    &filter,
                                    &reconciler,
                                    &ingress_event,
                                    &mut retries,
                                )
                                .await;
                            }
                        }
                        Some(Err(e)) => {
                            warn!("Ingress watcher error: {}", e);
                        }
                        None => {
                            info!("Ingress watch stream ended");
                            break;
                        }
                    }
                }
                Some(key) = retry_rx.recv() => {
                    retries.complete(&key);
                    reconcile_or_retry(&reconciler, key, &mut retries).await;
                }
                _ = resync.tick(), if resync_interval.is_some() => {
                    debug!("Resyncing {} known Ingress(es)", translator.len());
                    for ingress_event in translator.resync() {
                        admit_and_reconcile(&filter, &reconciler, &ingress_event, &mut retries)
                            .await;
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // The filter holds the last cleanup handle; the worker stops once it is gone
        drop(filter);
        let drained = cleanup.shutdown().await;
        info!("Ingress controller stopped ({} monitor cleanup(s) handled)", drained);
    }
}

/// Delayed requeue of failed reconciliations, at most one per Ingress
struct RetryQueue {
    tx: mpsc::UnboundedSender<IngressKey>,
    pending: HashSet<IngressKey>,
    delay: Duration,
}

impl RetryQueue {
    fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<IngressKey>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            tx,
            pending: HashSet::new(),
            delay,
        };
        (queue, rx)
    }

    /// Requeue `key` after the delay; false when a retry is already pending
    fn schedule(&mut self, key: IngressKey) -> bool {
        if !self.pending.insert(key.clone()) {
            return false;
        }
        let tx = self.tx.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(key);
        });
        true
    }

    /// Mark a requeued key as delivered
    fn complete(&mut self, key: &IngressKey) {
        self.pending.remove(key);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.pending.len()
    }
}

async fn admit_and_reconcile(
    filter: &EventFilter,
    reconciler: &IngressReconciler,
    event: &IngressEvent,
    retries: &mut RetryQueue,
) {
    if !filter.admit(event) {
        return;
    }
    if let Some(key) = event.key() {
        debug!("Admitted {} event for Ingress {}", event.kind(), key);
        reconcile_or_retry(reconciler, key, retries).await;
    }
}

async fn reconcile_or_retry(
    reconciler: &IngressReconciler,
    key: IngressKey,
    retries: &mut RetryQueue,
) {
    if let Err(e) = reconciler.reconcile(&key.namespace, &key.name).await {
        let delay = retries.delay;
        if retries.schedule(key.clone()) {
            error!(
                "Ingress {} reconciliation error: {} (retrying in {:?})",
                key, e, delay
            );
        } else {
            error!(
                "Ingress {} reconciliation error: {} (retry already pending)",
                key, e
            );
        }
    }
}
