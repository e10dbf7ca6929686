//! Two-player Egyptian War (Egg Rat Slap) server.
//!
//! One lobby holds at most two WebSocket connections. The lobby actor owns
//! the game session and applies each player action in turn, then sends every
//! connection its own view of the table.

pub mod app;
pub mod card_game;
pub mod domain;
pub mod game;
pub mod models;
pub mod shared;
pub mod web_socket;

use std::future::Future;

use anyhow::Result;
use tokio::net::TcpListener;

use crate::game::Lobby;

/// Runs the lobby and WebSocket endpoint on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let lobby_tx = Lobby::start();
    let app = app::create_routes(lobby_tx);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
