//! Controller metrics
//!
//! Prometheus counters for reconciliations and monitor actions, served on
//! `/metrics` by [`serve_metrics`].

use crate::error::OperatorError;
use crate::monitor::service::MonitorAction;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::convert::Infallible;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

lazy_static! {
    /// Controller metrics registry
    pub static ref CONTROLLER_METRICS_REGISTRY: Registry = Registry::new();

    /// Ingress reconciliation duration
    static ref INGRESS_RECONCILIATION_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "ingress_reconciliation_duration_seconds",
            "Ingress reconciliation duration in seconds",
        );
        let histogram = HistogramVec::new(opts, &["namespace"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// Ingress reconciliations total
    static ref INGRESS_RECONCILIATIONS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "ingress_reconciliations_total",
            "Total number of ingress reconciliations",
        );
        let counter = IntCounterVec::new(opts, &["namespace", "result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Monitor actions sent to the monitor service
    static ref MONITOR_ACTIONS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "monitor_actions_total",
            "Total number of monitor actions dispatched",
        );
        let counter = IntCounterVec::new(opts, &["action", "result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };
}

/// Record Ingress reconciliation
pub fn record_ingress_reconciliation(namespace: &str, duration_secs: f64, result: &str) {
    INGRESS_RECONCILIATION_DURATION
        .with_label_values(&[namespace])
        .observe(duration_secs);

    INGRESS_RECONCILIATIONS_TOTAL
        .with_label_values(&[namespace, result])
        .inc();
}

/// Record one dispatched monitor action
pub fn record_monitor_action(action: MonitorAction, result: &str) {
    let action = action.to_string();
    MONITOR_ACTIONS_TOTAL
        .with_label_values(&[action.as_str(), result])
        .inc();
}

/// Gather controller metrics in the Prometheus text format
pub fn gather_controller_metrics() -> Result<String, String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}

/// Serve `/metrics` and `/healthz` until `shutdown` completes
pub async fn serve_metrics<F>(bind_addr: &str, shutdown: F) -> Result<(), OperatorError>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Metrics listener bound to {}", bind_addr);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        debug!("Accepted metrics connection from {}", peer_addr);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service =
                                service_fn(|req: Request<Incoming>| handle_metrics_request(req));
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Metrics connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on {}: {}", bind_addr, e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Metrics listener on {} stopped", bind_addr);
                break;
            }
        }
    }

    Ok(())
}

async fn handle_metrics_request<B>(req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (status, body) = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => match gather_controller_metrics() {
            Ok(text) => (StatusCode::OK, text),
            Err(e) => {
                error!("{}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        },
        (&Method::GET, "/healthz") => (StatusCode::OK, "ok".to_string()),
        _ => (StatusCode::NOT_FOUND, "Not Found".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    if status == StatusCode::OK {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        );
    }
    Ok(response)
}
