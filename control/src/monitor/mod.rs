//! Uptime monitor plumbing
//!
//! - labels: projects Ingress metadata into monitor attributes
//! - service: the Monitor Service boundary (trait + dry-run backend)
//! - http: Monitor Service reached over HTTP
//! - dispatcher: builds and sends one monitor action per host

pub mod dispatcher;
pub mod http;
pub mod labels;
pub mod service;
