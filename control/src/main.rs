use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use uptime_control::apis::ingress::watch_ingresses;
use uptime_control::apis::metrics::serve_metrics;
use uptime_control::monitor::http::HttpMonitorService;
use uptime_control::{ControllerConfig, DryRunMonitorService, IngressController, MonitorService};

/// Uptime controller
///
/// Watches Ingress resources and keeps one uptime monitor per exposed host.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (needed for Kubernetes TLS client)
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok(); // Ignore error if already installed

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ControllerConfig::from_env()?;

    info!("Starting uptime controller");
    info!("   Enable key: {}", config.domain().enable_key());
    info!("   Metadata source: {}", config.metadata_source);
    info!(
        "   Namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    let service: Arc<dyn MonitorService> = match config.monitor_service.url.as_deref() {
        Some(url) => {
            info!("   Monitor service: {}", url);
            Arc::new(HttpMonitorService::new(
                url,
                Duration::from_secs(config.monitor_service.request_timeout_secs),
            )?)
        }
        None => {
            warn!("MONITOR_SERVICE_URL not set, monitor actions are only logged (dry run)");
            Arc::new(DryRunMonitorService)
        }
    };

    let client = kube::Client::try_default().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_handle = config.metrics_bind_addr.clone().map(|bind_addr| {
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = serve_metrics(&bind_addr, shutdown).await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    let events = watch_ingresses(client.clone(), config.watch_namespace.as_deref());
    let controller = IngressController::new(Arc::new(client), service, &config);

    controller.run(events, shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    info!("Uptime controller stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
