//! Ingress controller
//!
//! Watches networking.k8s.io/v1 Ingress resources and manages uptime
//! monitors for the hosts they expose.

pub mod cleanup;
pub mod events;
pub mod filter;
pub mod hosts;
#[allow(clippy::module_inception)]
pub mod ingress;

pub use ingress::{watch_ingresses, IngressController, IngressReconciler, IngressStore};
