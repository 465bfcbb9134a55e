//! Uptime controller library
//!
//! Keeps uptime monitors in sync with Kubernetes Ingress resources. Exposes
//! the label projection, monitor dispatch and Ingress controller for the
//! binary and for tests.

pub mod apis;
pub mod config;
pub mod error;
pub mod monitor;

pub use apis::ingress::{IngressController, IngressReconciler, IngressStore};
pub use config::ControllerConfig;
pub use error::OperatorError;
pub use monitor::dispatcher::MonitorDispatcher;
pub use monitor::labels::{LabelDomain, MetadataSource};
pub use monitor::service::{DryRunMonitorService, MonitorAction, MonitorService};
