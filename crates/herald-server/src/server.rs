//! `HeraldServer`: the Axum HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use herald_dispatch::Outbox;
use herald_store::DeviceRegistry;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::health::{self, HealthResponse};
use crate::routes;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Device registry.
    pub registry: Arc<DeviceRegistry>,
    /// Notification outbox.
    pub outbox: Arc<Outbox>,
    /// When the server started.
    pub start_time: Instant,
}

/// The Herald HTTP server.
pub struct HeraldServer {
    state: AppState,
}

impl HeraldServer {
    /// Create a new server.
    pub fn new(registry: Arc<DeviceRegistry>, outbox: Arc<Outbox>) -> Self {
        Self {
            state: AppState {
                registry,
                outbox,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/devices/apns", post(routes::register_device))
            .route("/notify", post(routes::notify))
            .route("/users/{user_id}/notifications", get(routes::history))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "herald server listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time))
}
