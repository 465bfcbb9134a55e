//! Ingress change events
//!
//! The watcher only reports "applied" and "deleted". The translator keeps the
//! last snapshot of every Ingress it has seen so an apply can be told apart
//! as a create or an update, and so known objects can be replayed on resync.

use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Identity of an Ingress
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngressKey {
    pub namespace: String,
    pub name: String,
}

impl IngressKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_ingress(ingress: &Ingress) -> Self {
        Self {
            namespace: ingress.namespace().unwrap_or_else(|| "default".to_string()),
            name: ingress.name_any(),
        }
    }
}

impl fmt::Display for IngressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A change to an Ingress
///
/// Objects are optional: an event without an object is valid and is never
/// admitted.
#[derive(Debug, Clone)]
pub enum IngressEvent {
    Created(Option<Arc<Ingress>>),
    Updated {
        old: Option<Arc<Ingress>>,
        new: Option<Arc<Ingress>>,
    },
    Deleted(Option<Arc<Ingress>>),
    /// Replay of an unchanged object (periodic resync)
    Generic(Option<Arc<Ingress>>),
}

impl IngressEvent {
    /// The object the event is about (the new one for updates)
    pub fn object(&self) -> Option<&Arc<Ingress>> {
        match self {
            IngressEvent::Created(obj)
            | IngressEvent::Deleted(obj)
            | IngressEvent::Generic(obj) => obj.as_ref(),
            IngressEvent::Updated { new, .. } => new.as_ref(),
        }
    }

    pub fn key(&self) -> Option<IngressKey> {
        self.object().map(|ingress| IngressKey::from_ingress(ingress))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IngressEvent::Created(_) => "create",
            IngressEvent::Updated { .. } => "update",
            IngressEvent::Deleted(_) => "delete",
            IngressEvent::Generic(_) => "generic",
        }
    }
}

/// Turns watcher events into [`IngressEvent`]s
#[derive(Debug, Default)]
pub struct EventTranslator {
    known: HashMap<IngressKey, Arc<Ingress>>,
    /// Keys seen since the current relist started
    relisted: Option<HashSet<IngressKey>>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Ingresses currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn translate(&mut self, event: watcher::Event<Ingress>) -> Vec<IngressEvent> {
        match event {
            watcher::Event::Init => {
                debug!("Ingress watcher (re)listing");
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(ingress) => {
                let key = IngressKey::from_ingress(&ingress);
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(key.clone());
                }
                vec![self.apply(key, ingress)]
            }
            watcher::Event::InitDone => {
                // Objects that vanished while the watch was down
                let seen = self.relisted.take().unwrap_or_default();
                let gone: Vec<IngressKey> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                info!(
                    "Ingress watcher initial sync complete ({} tracked, {} removed)",
                    seen.len(),
                    gone.len()
                );
                gone.into_iter()
                    .filter_map(|key| self.known.remove(&key))
                    .map(|ingress| IngressEvent::Deleted(Some(ingress)))
                    .collect()
            }
            watcher::Event::Apply(ingress) => {
                let key = IngressKey::from_ingress(&ingress);
                vec![self.apply(key, ingress)]
            }
            watcher::Event::Delete(ingress) => {
                let key = IngressKey::from_ingress(&ingress);
                self.known.remove(&key);
                vec![IngressEvent::Deleted(Some(Arc::new(ingress)))]
            }
        }
    }

    /// Replay every tracked Ingress as a generic event
    pub fn resync(&self) -> Vec<IngressEvent> {
        let mut keys: Vec<&IngressKey> = self.known.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.known.get(key))
            .map(|ingress| IngressEvent::Generic(Some(ingress.clone())))
            .collect()
    }

    fn apply(&mut self, key: IngressKey, ingress: Ingress) -> IngressEvent {
        let new = Arc::new(ingress);
        match self.known.insert(key, new.clone()) {
            Some(old) => IngressEvent::Updated {
                old: Some(old),
                new: Some(new),
            },
            None => IngressEvent::Created(Some(new)),
        }
    }
}
