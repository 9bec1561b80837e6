use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use blackout_core::error::ActionError;
use blackout_core::net::messages::{
    ActionRejectedMsg, ClientMessage, CreateRoomMsg, HostAction, InvestigationResultMsg,
    JoinResponseMsg, JoinRoomMsg, ReconnectMsg, ServerMessage,
};
use blackout_core::net::protocol::{MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message};
use blackout_core::player::{ConnectionId, PlayerId};
use blackout_core::room::RoomConfig;

use crate::registry::{self, PlayerSender};
use crate::state::AppState;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// The room and seat this connection currently speaks for.
#[derive(Clone)]
struct Binding {
    room_id: String,
    player_id: PlayerId,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id: ConnectionId = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    {
        let mut reg = state.registry.write().await;
        reg.register_connection(conn_id, tx.clone());
    }

    let (ws_sender, mut ws_receiver) = socket.split();
    spawn_writer(ws_sender, rx);

    // Fresh connections see the lobby immediately.
    let listing = registry::lobby_list(&state.registry).await;
    send_msg(&tx, &ServerMessage::LobbyList(listing));

    let mut binding: Option<Binding> = None;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }
        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(connection = %conn_id, error = %e, "Undecodable message");
                continue;
            },
        };
        match client_msg {
            ClientMessage::CreateRoom(m) => {
                handle_create(&state, conn_id, &tx, &mut binding, m).await;
            },
            ClientMessage::JoinRoom(m) => {
                handle_join(&state, conn_id, &tx, &mut binding, m).await;
            },
            ClientMessage::Reconnect(m) => {
                handle_reconnect(&state, conn_id, &tx, &mut binding, m).await;
            },
            other => {
                handle_room_action(&state, conn_id, &tx, &mut binding, other).await;
            },
        }
    }

    if let Some(b) = binding.take() {
        handle_disconnect(&state, &b, conn_id).await;
    }
    state.registry.write().await.unregister_connection(conn_id);
    tracing::debug!(connection = %conn_id, "Connection closed");
}

async fn handle_create(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &PlayerSender,
    binding: &mut Option<Binding>,
    m: CreateRoomMsg,
) {
    if binding.is_some() {
        send_msg(tx, &join_err("Already in a game."));
        return;
    }
    if let Some(err) = version_mismatch(m.protocol_version) {
        send_msg(tx, &join_err(&err));
        return;
    }

    let config = RoomConfig {
        game_name: m.game_name,
        roles: m.roles,
    };
    let result = {
        let mut reg = state.registry.write().await;
        reg.create_room(config, m.player_token, conn_id, &m.host_name, tx.clone())
    };
    match result {
        Ok((room_id, handle)) => {
            *binding = Some(Binding {
                room_id: room_id.clone(),
                player_id: m.player_token,
            });
            send_msg(
                tx,
                &ServerMessage::JoinResponse(JoinResponseMsg::ok(room_id.clone(), m.player_token)),
            );
            {
                let inner = handle.inner.lock().await;
                inner.broadcast_snapshot();
            }
            registry::broadcast_lobby_list(&state.registry).await;
            tracing::info!(room = %room_id, host = %m.player_token, "Room created");
        },
        Err(e) => send_msg(tx, &join_err(&e.to_string())),
    }
}

async fn handle_join(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &PlayerSender,
    binding: &mut Option<Binding>,
    m: JoinRoomMsg,
) {
    if binding.is_some() {
        send_msg(tx, &join_err("Already in a game."));
        return;
    }
    if let Some(err) = version_mismatch(m.protocol_version) {
        send_msg(tx, &join_err(&err));
        return;
    }
    if !blackout_core::room::is_valid_room_code(&m.room_id) {
        send_msg(tx, &join_err(&ActionError::RoomNotFound.to_string()));
        return;
    }

    let handle = {
        let reg = state.registry.read().await;
        reg.get(&m.room_id)
    };
    let Some(handle) = handle else {
        send_msg(tx, &join_err(&ActionError::RoomNotFound.to_string()));
        return;
    };

    let joined = {
        let mut inner = handle.inner.lock().await;
        match inner.game.add_player(m.player_token, conn_id, &m.player_name) {
            Ok(kind) => {
                *binding = Some(Binding {
                    room_id: m.room_id.clone(),
                    player_id: m.player_token,
                });
                send_msg(
                    tx,
                    &ServerMessage::JoinResponse(JoinResponseMsg::ok(
                        m.room_id.clone(),
                        m.player_token,
                    )),
                );
                inner.members.insert(m.player_token, tx.clone());
                inner.touch();
                inner.broadcast_snapshot();
                tracing::info!(
                    room = %m.room_id, player = %m.player_token, ?kind,
                    "Player joined"
                );
                true
            },
            Err(e) => {
                send_msg(tx, &join_err(&e.to_string()));
                false
            },
        }
    };
    if joined {
        // Member counts changed for the lobby listing.
        registry::broadcast_lobby_list(&state.registry).await;
    }
}

async fn handle_reconnect(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &PlayerSender,
    binding: &mut Option<Binding>,
    m: ReconnectMsg,
) {
    if binding.is_some() {
        send_msg(tx, &join_err("Already in a game."));
        return;
    }
    if let Some(err) = version_mismatch(m.protocol_version) {
        send_msg(tx, &join_err(&err));
        return;
    }

    let Some((room_id, handle)) = registry::find_player_room(&state.registry, m.player_token).await
    else {
        send_msg(tx, &join_err(&ActionError::RoomNotFound.to_string()));
        return;
    };

    let mut inner = handle.inner.lock().await;
    match inner.game.rebind(m.player_token, conn_id) {
        Ok(()) => {
            *binding = Some(Binding {
                room_id: room_id.clone(),
                player_id: m.player_token,
            });
            send_msg(
                tx,
                &ServerMessage::JoinResponse(JoinResponseMsg::ok(
                    room_id.clone(),
                    m.player_token,
                )),
            );
            // The new sender replaces the superseded connection's.
            inner.members.insert(m.player_token, tx.clone());
            inner.touch();
            inner.broadcast_snapshot();
            tracing::info!(room = %room_id, player = %m.player_token, "Player reconnected");
        },
        Err(e) => send_msg(tx, &join_err(&e.to_string())),
    }
}

async fn handle_room_action(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &PlayerSender,
    binding: &mut Option<Binding>,
    msg: ClientMessage,
) {
    let Some(b) = binding.clone() else {
        send_msg(tx, &rejected(&ActionError::RoomNotFound.to_string()));
        return;
    };
    let handle = {
        let reg = state.registry.read().await;
        reg.get(&b.room_id)
    };
    let Some(handle) = handle else {
        // The room was closed while this connection still thought it was in.
        *binding = None;
        send_msg(tx, &rejected(&ActionError::RoomNotFound.to_string()));
        return;
    };

    let pid = b.player_id;
    let mut inner = handle.inner.lock().await;
    let mut investigation: Option<InvestigationResultMsg> = None;
    let mut closing = false;
    let mut lobby_changed = false;

    let result: Result<(), ActionError> = match msg {
        ClientMessage::StartGame(_) => {
            let r = inner.game.start_game(pid, conn_id);
            if r.is_ok() {
                lobby_changed = true;
            }
            r
        },
        ClientMessage::AcknowledgeRole(_) => inner.game.acknowledge_role(pid, conn_id),
        ClientMessage::SelectTarget(m) => {
            inner.game.select_target(pid, conn_id, m.target).map(|hit| {
                if let Some(is_terrorist) = hit {
                    investigation = Some(InvestigationResultMsg {
                        target: m.target,
                        is_terrorist,
                    });
                }
            })
        },
        ClientMessage::CastVote(m) => inner.game.cast_vote(pid, conn_id, m.target),
        ClientMessage::HostAdvance(m) => match m.action {
            HostAction::BeginNight => inner.game.begin_night(pid, conn_id),
            HostAction::ConfirmTerrorist => inner.game.confirm_terrorist(pid, conn_id),
            HostAction::ConfirmPolice => inner.game.confirm_police(pid, conn_id),
            HostAction::ConfirmDoctor => inner.game.confirm_doctor(pid, conn_id),
            HostAction::StartDiscussion => inner.game.start_discussion(pid, conn_id),
            HostAction::StartVoting => inner.game.start_voting(pid, conn_id),
            HostAction::FinalizeVote => inner.game.finalize_vote(pid, conn_id),
            HostAction::NextRound => inner.game.next_round(pid, conn_id),
        },
        ClientMessage::CloseRoom(_) => {
            let r = inner.game.authorize_close(pid, conn_id);
            if r.is_ok() {
                closing = true;
            }
            r
        },
        // Join-phase messages are routed before this function.
        ClientMessage::CreateRoom(_) | ClientMessage::JoinRoom(_) | ClientMessage::Reconnect(_) => {
            return;
        },
    };

    match result {
        Err(e) => {
            drop(inner);
            tracing::debug!(player = %pid, room = %b.room_id, error = %e, "Action rejected");
            send_msg(tx, &rejected(&e.to_string()));
        },
        Ok(()) if closing => {
            drop(inner);
            registry::close_room(&state.registry, &b.room_id, "Game closed by the host.").await;
            *binding = None;
            registry::broadcast_lobby_list(&state.registry).await;
        },
        Ok(()) => {
            inner.touch();
            if let Some(inv) = investigation
                && let Some(bytes) = registry::encode(&ServerMessage::InvestigationResult(inv))
            {
                inner.send_to(pid, bytes);
            }
            inner.broadcast_snapshot();
            drop(inner);
            if lobby_changed {
                registry::broadcast_lobby_list(&state.registry).await;
            }
        },
    }
}

async fn handle_disconnect(state: &AppState, b: &Binding, conn_id: ConnectionId) {
    let handle = {
        let reg = state.registry.read().await;
        reg.get(&b.room_id)
    };
    let Some(handle) = handle else { return };

    let mut inner = handle.inner.lock().await;
    use blackout_core::game::DisconnectOutcome;
    match inner.game.disconnect(conn_id) {
        DisconnectOutcome::RoomAborted => {
            drop(inner);
            registry::close_room(&state.registry, &b.room_id, "Host disconnected. Game aborted.")
                .await;
            registry::broadcast_lobby_list(&state.registry).await;
        },
        DisconnectOutcome::LeftLobby(pid) => {
            inner.members.remove(&pid);
            inner.touch();
            inner.broadcast_snapshot();
            drop(inner);
            registry::broadcast_lobby_list(&state.registry).await;
            tracing::info!(room = %b.room_id, player = %pid, "Player left lobby");
        },
        DisconnectOutcome::WentOffline(pid) => {
            // Seat preserved for reconnection; only the sender is dropped.
            inner.members.remove(&pid);
            inner.touch();
            inner.broadcast_snapshot();
            tracing::info!(room = %b.room_id, player = %pid, "Player went offline");
        },
        DisconnectOutcome::UnknownConnection => {},
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

fn send_msg(tx: &PlayerSender, msg: &ServerMessage) {
    if let Some(bytes) = registry::encode(msg)
        && let Err(e) = tx.try_send(bytes)
    {
        tracing::debug!(error = %e, "Failed to queue outbound message");
    }
}

fn rejected(reason: &str) -> ServerMessage {
    ServerMessage::ActionRejected(ActionRejectedMsg {
        reason: reason.to_string(),
    })
}

fn join_err(reason: &str) -> ServerMessage {
    ServerMessage::JoinResponse(JoinResponseMsg::err(reason.to_string()))
}

fn version_mismatch(client: u8) -> Option<String> {
    // 0 means unversioned; accepted for older clients.
    if client != 0 && client != PROTOCOL_VERSION {
        Some(format!(
            "Protocol version mismatch: client={client}, server={PROTOCOL_VERSION}"
        ))
    } else {
        None
    }
}
