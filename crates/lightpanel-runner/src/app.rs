//! Wiring: link, indicator, panel actor and HTTP server.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;
use tracing::info;

use crate::actor::{PanelActor, PanelHandle};
use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::http;
use crate::indicator::indicator_for;
use crate::link::Link;
use crate::metrics::describe_metrics;

/// Start the panel actor for `config` without serving HTTP.
pub fn start_panel(config: &RunnerConfig) -> (PanelHandle, tokio::task::JoinHandle<()>) {
    let (link, link_events) = Link::new(Some(config.link.clone()));
    let indicator = indicator_for(config.indicator_pin);
    let (actor, handle) = PanelActor::new(link, link_events, indicator, config.ack_warn_after);
    (handle, actor.spawn())
}

/// Run the controller until SIGINT or SIGTERM.
pub async fn run(config: RunnerConfig) -> Result<(), RunnerError> {
    describe_metrics();
    if let Some(addr) = config.metrics_addr {
        install_exporter(addr)?;
    }

    info!("panel link: {}", config.link);
    match config.indicator_pin {
        Some(pin) => info!("connected indicator on GPIO{}", pin),
        None => info!("connected indicator disabled"),
    }

    let (panel, actor) = start_panel(&config);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.http_port));
    let listener = TcpListener::bind(addr).await.map_err(|source| RunnerError::Bind {
        port: config.http_port,
        source,
    })?;
    info!("listening on http://{}", addr);

    let served = axum::serve(listener, http::router(panel.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("shutting down");
    panel.shutdown().await;
    let _ = actor.await;

    served.map_err(RunnerError::Serve)
}

#[cfg(feature = "prometheus")]
fn install_exporter(addr: SocketAddr) -> Result<(), RunnerError> {
    crate::metrics::install_prometheus(addr)?;
    info!("metrics exporter listening on {}", addr);
    Ok(())
}

#[cfg(not(feature = "prometheus"))]
fn install_exporter(addr: SocketAddr) -> Result<(), RunnerError> {
    tracing::warn!(
        "metrics address {} ignored: built without the prometheus feature",
        addr
    );
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received interrupt"),
        _ = terminate => info!("received terminate"),
    }
}
