use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::game::{JoinRejected, LobbyCommand};
use crate::models::{ClientAction, ServerEvent};
use crate::shared::OUTBOUND_BUFFER;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    lobby_tx: mpsc::Sender<LobbyCommand>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, lobby_tx))
}

async fn handle_socket(socket: WebSocket, lobby_tx: mpsc::Sender<LobbyCommand>) {
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

    let (join_tx, join_rx) = oneshot::channel();
    if lobby_tx
        .send(LobbyCommand::Join { outbound, reply: join_tx })
        .await
        .is_err()
    {
        return;
    }

    let ticket = match join_rx.await {
        Ok(Ok(ticket)) => ticket,
        Ok(Err(JoinRejected::Full)) => {
            reject(socket).await;
            return;
        }
        Err(_) => return,
    };
    let connection = ticket.connection;

    tracing::info!(%connection, role = ?ticket.role, "[WS] connected");

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_events(sink, outbound_rx));
    let mut writer_done = false;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let action = match text.parse::<ClientAction>() {
                            Ok(action) => action,
                            Err(err) => {
                                tracing::debug!(%connection, %err, "[WS] ignoring message");
                                continue;
                            }
                        };
                        let cmd = LobbyCommand::Action { connection, action };
                        if lobby_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }

                    Some(Ok(Message::Close(_))) | None => break,

                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(%connection, %err, "[WS] read error");
                        break;
                    }
                }
            }

            // the lobby dropped our queue: peer left or lobby closed
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    let _ = lobby_tx.send(LobbyCommand::Disconnect { connection }).await;
    if !writer_done {
        let _ = writer.await;
    }

    tracing::info!(%connection, "[WS] disconnected");
}

/// Drains the lobby's queue into the socket, then closes it.
async fn write_events(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, "[WS] failed to encode event");
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

async fn reject(mut socket: WebSocket) {
    tracing::info!("[WS] lobby full, turning connection away");
    if let Ok(text) = ServerEvent::Full.to_json() {
        let _ = socket.send(Message::Text(text)).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}
