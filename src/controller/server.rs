//! # HTTP Server
//!
//! HTTP listeners for metrics and Kubernetes probes.
//!
//! Provides endpoints:
//! - `/metrics` - Prometheus metrics in text format (metrics address)
//! - `/healthz` - Liveness probe, always 200 (probe address)
//! - `/readyz` - Readiness probe, 200 while the operator is ready (probe address)
//!
//! Either listener can be disabled by binding it to `0`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::observability::metrics;

/// Listener and readiness flags shared between the server and the runtime
///
/// `listening` flips once the listeners are bound; `ready` is what `/readyz`
/// reports and is driven by the runtime.
#[derive(Debug)]
pub struct ServerState {
    is_listening: AtomicBool,
    is_ready: AtomicBool,
}

impl ServerState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            is_listening: AtomicBool::new(false),
            is_ready: AtomicBool::new(false),
        }
    }

    pub fn set_listening(&self) {
        self.is_listening.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn listening(&self) -> bool {
        self.is_listening.load(Ordering::Relaxed)
    }

    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
}

pub fn probe_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured listeners, mark them listening and serve until an error
///
/// # Errors
/// Returns an error if a listener cannot bind or a server stops with an error
pub async fn start_server(config: ServerConfig, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let metrics_listener = bind(config.metrics_addr, "metrics").await?;
    let probe_listener = bind(config.probe_addr, "health probe").await?;

    state.set_listening();

    let metrics_server = async move {
        match metrics_listener {
            Some(listener) => axum::serve(listener, metrics_router())
                .await
                .context("metrics server failed"),
            None => Ok(()),
        }
    };
    let probe_server = async move {
        match probe_listener {
            Some(listener) => axum::serve(listener, probe_router(state))
                .await
                .context("health probe server failed"),
            None => Ok(()),
        }
    };

    tokio::try_join!(metrics_server, probe_server)?;
    Ok(())
}

async fn bind(addr: Option<SocketAddr>, what: &str) -> Result<Option<TcpListener>, anyhow::Error> {
    let Some(addr) = addr else {
        info!("{} server disabled", what);
        return Ok(None);
    };
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {what} server to {addr}"))?;
    info!("{} server listening on {}", what, addr);
    Ok(Some(listener))
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readyz_follows_state() {
        let state = Arc::new(ServerState::new());
        let response = readyz_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true);
        let response = readyz_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_binding_listeners_does_not_mark_ready() {
        let config = ServerConfig::from_flags("0", "0", false).unwrap();
        let state = Arc::new(ServerState::new());

        start_server(config, Arc::clone(&state)).await.unwrap();

        assert!(state.listening());
        assert!(!state.ready());
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        assert_eq!(healthz_handler().await.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_handler_renders_text() {
        metrics::increment_reconciliations();
        let response = metrics_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
