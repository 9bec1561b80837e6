use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use blackout_core::net::messages::{
    ClientMessage, CreateRoomMsg, HostAction, HostAdvanceMsg, JoinResponseMsg, JoinRoomMsg,
    RoomSnapshotMsg, ServerMessage,
};
use blackout_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use blackout_core::player::PlayerId;
use blackout_core::room::RoleCounts;

use blackout_server::config::ServerConfig;
use blackout_server::{build_app, spawn_idle_sweeper};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        spawn_idle_sweeper(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the server.
pub async fn ws_connect(server: &TestServer) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(server.ws_url())
        .await
        .unwrap();
    stream
}

/// Send a ClientMessage on a WS stream.
pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read the next ServerMessage (5s timeout).
pub async fn ws_next(stream: &mut WsStream) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return decode_server_message(&data).unwrap(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read the next ServerMessage, returning None on timeout or close.
pub async fn ws_try_next(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Some(decode_server_message(&data).unwrap());
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                _ => continue,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Read messages until one matches the predicate (5s timeout). Interim
/// broadcasts (snapshots, lobby listings) are skipped.
pub async fn ws_wait_for<F>(stream: &mut WsStream, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = ws_next(stream).await;
            if pred(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching message")
}

/// Wait for the next JoinResponse, success or error.
pub async fn ws_expect_join_response(stream: &mut WsStream) -> JoinResponseMsg {
    match ws_wait_for(stream, |m| matches!(m, ServerMessage::JoinResponse(_))).await {
        ServerMessage::JoinResponse(resp) => resp,
        _ => unreachable!(),
    }
}

/// Wait for the next snapshot matching the predicate.
pub async fn ws_expect_snapshot<F>(stream: &mut WsStream, mut pred: F) -> RoomSnapshotMsg
where
    F: FnMut(&RoomSnapshotMsg) -> bool,
{
    let msg = ws_wait_for(stream, |m| match m {
        ServerMessage::RoomSnapshot(snap) => pred(snap),
        _ => false,
    })
    .await;
    match msg {
        ServerMessage::RoomSnapshot(snap) => *snap,
        _ => unreachable!(),
    }
}

/// Create a room, asserting success. Returns the room code.
pub async fn create_room(
    stream: &mut WsStream,
    host_token: PlayerId,
    host_name: &str,
    roles: RoleCounts,
) -> String {
    ws_send(
        stream,
        &ClientMessage::CreateRoom(CreateRoomMsg {
            game_name: "Friday Night".to_string(),
            host_name: host_name.to_string(),
            roles,
            player_token: host_token,
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;
    let resp = ws_expect_join_response(stream).await;
    assert!(resp.success, "Expected successful create: {resp:?}");
    resp.room_id.unwrap()
}

/// Join an existing room. Returns the JoinResponse (success or error).
pub async fn join_room(
    stream: &mut WsStream,
    room_id: &str,
    name: &str,
    token: PlayerId,
) -> JoinResponseMsg {
    ws_send(
        stream,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            room_id: room_id.to_string(),
            player_name: name.to_string(),
            player_token: token,
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;
    ws_expect_join_response(stream).await
}

/// Send a host phase-advancement command.
pub async fn host_advance(stream: &mut WsStream, action: HostAction) {
    ws_send(
        stream,
        &ClientMessage::HostAdvance(HostAdvanceMsg { action }),
    )
    .await;
}
