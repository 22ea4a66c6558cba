//! HTTP server setup with Axum

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::rest::events;
use super::websocket::{handler::ws_handler, state::HubState};
use crate::config::HubConfig;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<HubState>) -> Router {
    // The dashboard may be served from another origin during development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(health_check))
        .route("/api/events", post(events::publish_event))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Handle for a running hub
pub struct HubHandle {
    address: SocketAddr,
    state: Arc<HubState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HubHandle {
    /// Return the bound listening address.
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// Shared state, for publishing events in-process
    pub fn state(&self) -> &Arc<HubState> {
        &self.state
    }

    /// Trigger graceful shutdown and await completion.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|err| anyhow::anyhow!(err))
    }
}

/// Bind the hub and serve it in the background
pub async fn spawn_hub(config: &HubConfig) -> anyhow::Result<HubHandle> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    let address = listener.local_addr()?;
    info!(address = %address, "realtime hub listening");

    let state = Arc::new(HubState::new(config.capacity));
    let app = create_router(state.clone());

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        });
        if let Err(err) = server.await {
            warn!(error = %err, "realtime hub exited with error");
        }
    });

    Ok(HubHandle {
        address,
        state,
        shutdown: shutdown_tx,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn publish(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/events")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let state = Arc::new(HubState::new(16));
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_publish_event_broadcasts() {
        let state = Arc::new(HubState::new(16));
        let mut rx = state.subscribe();
        let app = create_router(state.clone());

        let response = app
            .oneshot(publish(r#"{"type":"client_created","data":{"name":"Acme"}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.msg_type, "client_created");
        assert_eq!(msg.data_field("name").as_deref(), Some("Acme"));
        assert!(msg.timestamp.is_some());
        assert_eq!(state.published_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_rejects_non_mutation_type() {
        let state = Arc::new(HubState::new(16));
        let app = create_router(state.clone());

        let response = app.oneshot(publish(r#"{"type":"pong"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.published_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let config = HubConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            capacity: 16,
        };
        let hub = spawn_hub(&config).await.unwrap();
        assert_ne!(hub.local_addr().port(), 0);
        hub.shutdown().await.unwrap();
    }
}
