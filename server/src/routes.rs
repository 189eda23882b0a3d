use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use log::info;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tower_http::services::ServeDir;

use crate::client_manager::ClientManager;
use crate::network::{handle_socket, ServerMessage};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<RwLock<ClientManager>>,
    pub server_tx: mpsc::UnboundedSender<ServerMessage>,
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub status: &'static str,
    pub message: &'static str,
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/socket", get(ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// `GET /api/status`
pub async fn status() -> Json<Status> {
    Json(Status {
        status: "ok",
        message: "Server is running",
    })
}

/// `GET /socket`: upgrade to the game event stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

async fn log_requests(request: Request, next: Next) -> Response {
    info!("{} {}", request.method(), request.uri());
    next.run(request).await
}
