//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::entity::EntityId;
use crate::game::{GameEvent, GameHandle};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, Outbound, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let conn_id = Uuid::new_v4();
    debug!(conn_id = %conn_id, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, conn_id, state.game))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, conn_id: Uuid, game: GameHandle) {
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (direct_tx, direct_rx) = mpsc::channel::<ServerMsg>(64);
    let events_rx = game.subscribe();

    let welcome = ServerMsg::Welcome {
        server_time: unix_millis(),
    };
    if direct_tx.send(welcome).await.is_err() {
        error!(conn_id = %conn_id, "Failed to queue welcome");
        return;
    }

    let writer_handle = tokio::spawn(run_writer(conn_id, ws_sink, direct_rx, events_rx));

    let player_id = run_reader(conn_id, ws_stream, &game, &direct_tx).await;

    // Socket gone: the player leaves the game
    if let Some(player_id) = player_id {
        game.disconnect(player_id).await;
    }

    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Forward direct replies and broadcast game events to the socket
async fn run_writer(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
    mut events_rx: broadcast::Receiver<GameEvent>,
) {
    loop {
        // Direct replies go out ahead of queued broadcast events
        let outbound = tokio::select! {
            biased;
            direct = direct_rx.recv() => match direct {
                Some(msg) => Outbound::Direct(msg),
                None => break,
            },
            event = events_rx.recv() => match event {
                Ok(event) => Outbound::Event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Don't disconnect for lag, the next snapshot catches the client up
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Event channel closed");
                    break;
                }
            },
        };

        let json = match outbound.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "Failed to encode message");
                continue;
            }
        };

        if let Err(e) = ws_sink.send(Message::Text(json)).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Read client messages until the socket closes. Returns the player still
/// in the game, if any.
async fn run_reader(
    conn_id: Uuid,
    mut ws_stream: SplitStream<WebSocket>,
    game: &GameHandle,
    direct_tx: &mpsc::Sender<ServerMsg>,
) -> Option<EntityId> {
    let rate_limiter = PlayerRateLimiter::new();
    let mut player_id: Option<EntityId> = None;

    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
                continue;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        };

        if !rate_limiter.check_input() {
            warn!(conn_id = %conn_id, "Rate limited message");
            continue;
        }

        let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                let _ = direct_tx
                    .send(ServerMsg::error("bad_message", e.to_string()))
                    .await;
                continue;
            }
        };

        let reply = match client_msg {
            ClientMsg::JoinGame {
                player_name,
                vehicle_type,
            } => {
                if player_id.is_some() {
                    Some(ServerMsg::error("already_joined", "Already in the game"))
                } else if !rate_limiter.check_join() {
                    Some(ServerMsg::error("rate_limited", "Too many join attempts"))
                } else {
                    let result = game.join(player_name, vehicle_type).await;
                    match &result {
                        Ok(accepted) => {
                            info!(conn_id = %conn_id, player_id = %accepted.player.id, "Joined game");
                            player_id = Some(accepted.player.id.clone());
                        }
                        Err(e) => info!(conn_id = %conn_id, reason = %e, "Join rejected"),
                    }
                    Some(ServerMsg::join_result(result))
                }
            }
            ClientMsg::PlayerInput { inputs } => {
                if let Some(id) = &player_id {
                    game.send_input(id.clone(), inputs.sanitized()).await;
                }
                None
            }
            ClientMsg::Ping { t } => Some(ServerMsg::Pong { t }),
            ClientMsg::Leave => {
                if let Some(id) = player_id.take() {
                    game.disconnect(id).await;
                }
                None
            }
        };

        if let Some(reply) = reply {
            if direct_tx.send(reply).await.is_err() {
                debug!(conn_id = %conn_id, "Writer gone");
                break;
            }
        }
    }

    player_id
}
