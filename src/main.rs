//! A6 — Process entry point.
//!
//! Loads `BrokerConfig` from the environment, wires the in-process
//! collaborator stand-ins (A5) into a `Pipeline`, serves the A4 HTTP
//! surface, and drains in-flight queries on SIGINT/SIGTERM via
//! `tokio::signal::unix`, replacing the teacher's original
//! DuckDB-extension-loading loop with an axum server shutdown future.

use std::process;
use std::sync::Arc;

use broker_core::config::BrokerConfig;
use broker_core::logging;
use broker_core::pipeline::Pipeline;
use broker_core::providers::{StaticRoutingProvider, StaticTimeBoundaryProvider};
use broker_core::server::build_router;
use broker_core::transport::InProcessTransport;

#[tokio::main]
async fn main() {
    logging::init();

    let config = match BrokerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("invalid broker configuration: {err}");
            process::exit(1);
        }
    };

    tracing::info!(broker_id = %config.broker_id, listen_addr = %config.listen_addr, "starting broker");

    let routing = Arc::new(StaticRoutingProvider::new());
    let time_boundary = Arc::new(StaticTimeBoundaryProvider::new());
    let transport = Arc::new(InProcessTransport::new());

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(config.clone()),
        routing,
        time_boundary,
        transport,
    ));

    let app = build_router(pipeline);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, addr = %config.listen_addr, "failed to bind listen address");
            process::exit(1);
        }
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        tracing::error!(%err, "broker server exited with error");
        process::exit(1);
    }

    tracing::info!("broker shut down");
}

/// Resolves once SIGINT or SIGTERM is observed, letting
/// `with_graceful_shutdown` stop accepting new connections while
/// in-flight queries finish under axum's own drain. The teacher's CLI
/// parked on the same two signals via a `signal_hook::flag`-and-poll
/// loop; `tokio::signal::unix` gets the same effect as a plain async
/// wait, with no polling.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, draining"),
        _ = sigint.recv() => tracing::info!("received SIGINT, draining"),
    }
}
