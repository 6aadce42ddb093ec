use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use hubcast_hub::spawn_client;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::params::JoinParams;
use crate::ws::transport::WsConnection;

/// Axum handler, upgrades HTTP to WebSocket at GET /ws?name=<display name>.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let name = params.display_name();
    ws.max_message_size(state.client.max_message_bytes)
        .on_upgrade(move |socket| run_connection(socket, name, state))
}

/// Lives for the entire WS session: joins the hub, then waits for both pumps.
async fn run_connection(socket: WebSocket, name: String, state: Arc<AppState>) {
    let conn = WsConnection::new(socket);
    let tasks = match spawn_client(
        &state.hub,
        name.clone(),
        conn,
        &state.client,
        state.shutdown.child_token(),
    ) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(name = %name, error = %e, "could not join hub");
            return;
        }
    };

    let id = tasks.id();
    info!(client = %id, name = %name, "new WS connection");
    let (read, write) = tasks.wait().await;
    info!(client = %id, read = ?read, write = ?write, "WS connection closed");
}
