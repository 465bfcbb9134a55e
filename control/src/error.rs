use thiserror::Error;

/// Uptime operator errors
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("no labels or annotations to build a monitor from")]
    MissingSource,

    #[error("monitor for {host} rejected: {message}")]
    Dispatch { host: String, message: String },

    #[error("failed to fetch Ingress: {0}")]
    Fetch(String),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Monitor service transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
