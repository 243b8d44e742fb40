pub mod config;
pub mod session;

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::info;
use uuid::Uuid;
use wsrelay_core::ServiceManager;

use session::TungsteniteSession;

/// One fallback-free wildcard route; every path is resolved dynamically
/// through `manager.try_get` rather than registered per-endpoint in the
/// router itself.
pub fn build_router(manager: Arc<ServiceManager>) -> Router {
    Router::new()
        .route("/*path", get(ws_upgrade_handler))
        .with_state(manager)
}

async fn ws_upgrade_handler(
    Path(path): Path<String>,
    ws: WebSocketUpgrade,
    State(manager): State<Arc<ServiceManager>>,
) -> Response {
    let full_path = format!("/{path}");
    match manager.try_get(&full_path).await {
        Some(host) => ws.on_upgrade(move |socket| handle_socket(socket, host)),
        None => (StatusCode::NOT_FOUND, "no such endpoint").into_response(),
    }
}

async fn handle_socket(socket: axum::extract::ws::WebSocket, host: Arc<wsrelay_core::ServiceHost>) {
    let session_id = Uuid::new_v4().to_string();
    let (session, read_half) = TungsteniteSession::new(session_id.clone(), socket);
    host.sessions().add(session.clone()).await;
    info!(session_id = %session_id, path = %host.path(), "session registered");

    session.clone().run_read_loop(read_half).await;

    host.sessions().remove(&session_id).await;
    info!(session_id = %session_id, path = %host.path(), "session deregistered");
}
