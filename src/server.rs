//! HTTP endpoint serving the registry and the interface inventory.
//!
//! Routes:
//! - `GET <metrics_path>`: Prometheus text exposition
//! - `GET /interfaces`: last good snapshot as JSON (`null` before the first)
//! - `GET /healthz`: liveness
//!
//! Handlers only read; scraping never triggers a poll.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::{StatusCode, header};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::metrics::{MetricsError, MetricsRegistry};
use crate::network::{Interface, Snapshot};
use crate::time::unix_seconds;

/// Path of the JSON inventory route.
pub const INTERFACES_PATH: &str = "/interfaces";

/// Path of the liveness route.
pub const HEALTH_PATH: &str = "/healthz";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    registry: Arc<MetricsRegistry>,
    snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
}

impl ServerState {
    /// Creates handler state from the registry and the poller's snapshot channel.
    #[must_use]
    pub const fn new(
        registry: Arc<MetricsRegistry>,
        snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
    ) -> Self {
        Self {
            registry,
            snapshots,
        }
    }
}

/// JSON body of the inventory route.
#[derive(Debug, Serialize)]
struct Inventory<'a> {
    captured_at: u64,
    interfaces: BTreeMap<&'a str, &'a Interface>,
}

impl<'a> From<&'a Snapshot> for Inventory<'a> {
    fn from(snapshot: &'a Snapshot) -> Self {
        Self {
            captured_at: unix_seconds(snapshot.captured_at()),
            interfaces: snapshot
                .interfaces()
                .map(|iface| (iface.name.as_str(), iface))
                .collect(),
        }
    }
}

/// Renders the registry on the blocking pool.
async fn metrics_handler(State(state): State<ServerState>) -> Response {
    let registry = Arc::clone(&state.registry);
    match tokio::task::spawn_blocking(move || registry.render()).await {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            tracing::error!("Failed to render metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render metrics: {e}"),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Metrics render task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn interfaces_handler(State(state): State<ServerState>) -> Response {
    let snapshot = state.snapshots.borrow().clone();
    match snapshot {
        Some(snapshot) => Json(Inventory::from(snapshot.as_ref())).into_response(),
        None => Json(serde_json::Value::Null).into_response(),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Builds the router with request tracing.
pub fn router(state: ServerState, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(INTERFACES_PATH, get(interfaces_handler))
        .route(HEALTH_PATH, get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listen socket.
///
/// # Errors
///
/// Returns [`MetricsError::BindAddress`] if the address cannot be bound.
pub async fn bind(address: SocketAddr) -> Result<TcpListener, MetricsError> {
    TcpListener::bind(address)
        .await
        .map_err(|e| MetricsError::bind_address(address.to_string(), e))
}

/// Serves `router` on `listener` until `shutdown` completes.
///
/// # Errors
///
/// Returns [`MetricsError::Serve`] if the server fails.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), MetricsError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        tracing::info!("Serving metrics on http://{address}");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(MetricsError::Serve)
}
