//! Uptime controller integration tests
//!
//! Drive the public controller API end to end with an in-memory Ingress
//! store and a recording monitor service.
//!
//! Run with: cargo test --test reconcile_test

#![allow(clippy::expect_used, clippy::panic, clippy::unwrap_used)]

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{Ingress, IngressRule, IngressSpec, IngressTLS};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::watcher;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uptime_control::monitor::labels::MonitorAttributes;
use uptime_control::monitor::service::ActionResult;
use uptime_control::{
    ControllerConfig, IngressController, IngressStore, MonitorAction, MonitorService,
    OperatorError,
};

#[derive(Default)]
struct MemoryStore {
    ingresses: Mutex<HashMap<(String, String), Ingress>>,
}

impl MemoryStore {
    fn put(&self, ingress: &Ingress) {
        let key = (
            ingress.metadata.namespace.clone().unwrap_or_default(),
            ingress.metadata.name.clone().unwrap_or_default(),
        );
        self.ingresses.lock().unwrap().insert(key, ingress.clone());
    }
}

#[async_trait]
impl IngressStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Ingress>, OperatorError> {
        Ok(self
            .ingresses
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

#[derive(Default)]
struct RecordingService {
    requests: Mutex<Vec<(MonitorAttributes, MonitorAction)>>,
}

impl RecordingService {
    fn requests(&self) -> Vec<(MonitorAttributes, MonitorAction)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MonitorService for RecordingService {
    async fn handle_request(
        &self,
        items: Vec<MonitorAttributes>,
        action: MonitorAction,
    ) -> Vec<ActionResult> {
        let mut requests = self.requests.lock().unwrap();
        items
            .into_iter()
            .map(|item| {
                requests.push((item, action));
                ActionResult::new()
            })
            .collect()
    }
}

fn annotated_ingress(name: &str, annotations: &[(&str, &str)]) -> Ingress {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Ingress {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("shop".to_string()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            rules: Some(vec![
                IngressRule {
                    host: Some("shop.example.com".to_string()),
                    ..Default::default()
                },
                IngressRule {
                    host: Some("status.example.com".to_string()),
                    ..Default::default()
                },
            ]),
            tls: Some(vec![IngressTLS {
                hosts: Some(vec!["shop.example.com".to_string()]),
                secret_name: Some("shop-tls".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn config() -> ControllerConfig {
    let vars: HashMap<&str, &str> = [
        ("DOMAIN_LABEL_PREFIX", "example.com"),
        ("MONITOR_METADATA_SOURCE", "annotations"),
    ]
    .into_iter()
    .collect();
    ControllerConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
        .expect("Should load config")
}

#[tokio::test]
async fn test_monitor_lifecycle_follows_ingress() {
    let ingress = annotated_ingress(
        "storefront",
        &[
            ("example.com/uptimerobot-monitor", "true"),
            ("example.com/uptimerobot-monitor-type", "HTTP"),
            ("example.com/uptimerobot-monitor-interval", "60"),
            ("example.com/uptimerobot-monitor-friendly_name", "storefront"),
            ("kubernetes.io/ingress.class", "nginx"),
        ],
    );

    let store = Arc::new(MemoryStore::default());
    store.put(&ingress);
    let service = Arc::new(RecordingService::default());
    let controller = IngressController::new(store.clone(), service.clone(), &config());

    let events = futures::stream::iter(vec![
        Ok::<_, watcher::Error>(watcher::Event::Init),
        Ok(watcher::Event::InitApply(ingress.clone())),
        Ok(watcher::Event::InitDone),
        Ok(watcher::Event::Delete(ingress)),
    ]);

    controller.run(events, futures::future::pending()).await;

    let requests = service.requests();
    assert_eq!(requests.len(), 3, "Two hosts created, one monitor deleted");

    // Hosts are handled in sorted order
    let (created, action) = &requests[0];
    assert_eq!(*action, MonitorAction::Update);
    assert_eq!(created.get("url").map(String::as_str), Some("https://shop.example.com"));
    assert_eq!(created.get("type").map(String::as_str), Some("HTTP"));
    assert_eq!(created.get("interval").map(String::as_str), Some("60"));
    assert!(
        !created.contains_key("kubernetes.io/ingress.class"),
        "Foreign annotations are not forwarded"
    );

    let (created, action) = &requests[1];
    assert_eq!(*action, MonitorAction::Update);
    assert_eq!(created.get("url").map(String::as_str), Some("http://status.example.com"));

    let (deleted, action) = &requests[2];
    assert_eq!(*action, MonitorAction::Delete);
    assert_eq!(deleted.get("url").map(String::as_str), Some(""));
    assert_eq!(deleted.get("friendly_name").map(String::as_str), Some("storefront"));
}

#[tokio::test]
async fn test_unlabelled_ingress_is_left_alone() {
    let ingress = annotated_ingress("internal", &[("kubernetes.io/ingress.class", "nginx")]);

    let store = Arc::new(MemoryStore::default());
    store.put(&ingress);
    let service = Arc::new(RecordingService::default());
    let controller = IngressController::new(store, service.clone(), &config());

    let events = futures::stream::iter(vec![
        Ok::<_, watcher::Error>(watcher::Event::Apply(ingress.clone())),
        Ok(watcher::Event::Apply(ingress.clone())),
        Ok(watcher::Event::Delete(ingress)),
    ]);

    controller.run(events, futures::future::pending()).await;

    assert!(service.requests().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_controller() {
    let store = Arc::new(MemoryStore::default());
    let service = Arc::new(RecordingService::default());
    let controller = IngressController::new(store, service.clone(), &config());

    // A watch that never produces anything
    let events = futures::stream::pending::<Result<watcher::Event<Ingress>, watcher::Error>>();

    controller.run(events, async {}).await;

    assert!(service.requests().is_empty());
}
