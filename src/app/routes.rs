use axum::{extract::ws::WebSocketUpgrade, routing::get, Router};
use tokio::sync::mpsc;

use crate::game::LobbyCommand;
use crate::shared::WS_PATH;

pub fn create_routes(lobby_tx: mpsc::Sender<LobbyCommand>) -> Router {
    Router::new().route(
        WS_PATH,
        get(move |ws: WebSocketUpgrade| crate::web_socket::ws_handler(ws, lobby_tx)),
    )
}
