use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};

use blackout_core::error::ActionError;
use blackout_core::game::GameRoom;
use blackout_core::net::messages::{LobbyListMsg, RoomClosedMsg, ServerMessage};
use blackout_core::net::protocol::encode_server_message;
use blackout_core::player::{ConnectionId, PlayerId};
use blackout_core::room::RoomConfig;

use crate::state::SharedRegistry;

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting to multiple players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Encode a server message for the wire, logging on failure.
pub fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server message");
            None
        },
    }
}

/// Everything behind a room's lock: the game state plus the senders of its
/// connected members. Committing a mutation and capturing the snapshot that
/// describes it happen under this one lock.
pub struct RoomInner {
    pub game: GameRoom,
    pub members: HashMap<PlayerId, PlayerSender>,
    pub last_activity: Instant,
}

impl RoomInner {
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Broadcast raw bytes to every member, skipping slow clients.
    pub fn broadcast(&self, bytes: Bytes) {
        for (&pid, sender) in &self.members {
            if let Err(e) = sender.try_send(bytes.clone()) {
                tracing::debug!(
                    player_id = %pid, room = %self.game.room_id, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    /// Broadcast the current room snapshot to every member.
    pub fn broadcast_snapshot(&self) {
        let msg = ServerMessage::RoomSnapshot(Box::new(self.game.snapshot()));
        if let Some(bytes) = encode(&msg) {
            self.broadcast(bytes);
        }
    }

    /// Send to one member only.
    pub fn send_to(&self, player_id: PlayerId, bytes: Bytes) {
        if let Some(sender) = self.members.get(&player_id)
            && let Err(e) = sender.try_send(bytes)
        {
            tracing::debug!(
                player_id = %player_id, room = %self.game.room_id, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }
}

/// One room, independently lockable. Two rooms never contend on each other.
pub struct RoomHandle {
    pub inner: Mutex<RoomInner>,
}

/// The top-level map of rooms plus every open connection. Held briefly for
/// lookups and inserts; room state itself lives behind each [`RoomHandle`].
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Arc<RoomHandle>>,
    connections: HashMap<ConnectionId, PlayerSender>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_connection(&mut self, conn: ConnectionId, sender: PlayerSender) {
        self.connections.insert(conn, sender);
    }

    pub fn unregister_connection(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
    }

    /// Create a room with a freshly generated unique code. The host is seated
    /// and connected; the room starts in the lobby.
    pub fn create_room(
        &mut self,
        config: RoomConfig,
        host_id: PlayerId,
        host_conn: ConnectionId,
        host_name: &str,
        sender: PlayerSender,
    ) -> Result<(String, Arc<RoomHandle>), ActionError> {
        let room_id = self.generate_unique_room_code();
        let game = GameRoom::new(room_id.clone(), config, host_id, host_conn, host_name)?;
        let mut members = HashMap::new();
        members.insert(host_id, sender);
        let handle = Arc::new(RoomHandle {
            inner: Mutex::new(RoomInner {
                game,
                members,
                last_activity: Instant::now(),
            }),
        });
        self.rooms.insert(room_id.clone(), Arc::clone(&handle));
        Ok((room_id, handle))
    }

    fn generate_unique_room_code(&self) -> String {
        loop {
            let code = blackout_core::room::generate_room_code();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(room_id).map(Arc::clone)
    }

    pub fn remove(&mut self, room_id: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.remove(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn handles(&self) -> Vec<(String, Arc<RoomHandle>)> {
        self.rooms
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect()
    }

    /// Send raw bytes to every open connection, in or out of a room.
    pub fn broadcast_all(&self, bytes: Bytes) {
        for (conn, sender) in &self.connections {
            if let Err(e) = sender.try_send(bytes.clone()) {
                tracing::debug!(connection = %conn, error = %e, "Skipping slow connection");
            }
        }
    }
}

/// Build the current lobby listing: every room still accepting players.
pub async fn lobby_list(registry: &SharedRegistry) -> LobbyListMsg {
    let handles = {
        let reg = registry.read().await;
        reg.handles()
    };
    let mut rooms = Vec::new();
    for (_, handle) in handles {
        let inner = handle.inner.lock().await;
        if let Some(entry) = inner.game.lobby_entry() {
            rooms.push(entry);
        }
    }
    rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
    LobbyListMsg { rooms }
}

/// Push the current lobby listing to every open connection.
pub async fn broadcast_lobby_list(registry: &SharedRegistry) {
    let listing = lobby_list(registry).await;
    if let Some(bytes) = encode(&ServerMessage::LobbyList(listing)) {
        let reg = registry.read().await;
        reg.broadcast_all(bytes);
    }
}

/// Find the room holding a seat for this player, for reconnection.
pub async fn find_player_room(
    registry: &SharedRegistry,
    player_id: PlayerId,
) -> Option<(String, Arc<RoomHandle>)> {
    let handles = {
        let reg = registry.read().await;
        reg.handles()
    };
    for (room_id, handle) in handles {
        let inner = handle.inner.lock().await;
        if inner.game.player(player_id).is_some() {
            drop(inner);
            return Some((room_id, handle));
        }
    }
    None
}

/// Destroy a room: notify members, then drop it from the registry.
pub async fn close_room(registry: &SharedRegistry, room_id: &str, reason: &str) {
    let handle = {
        let mut reg = registry.write().await;
        reg.remove(room_id)
    };
    let Some(handle) = handle else { return };
    let mut inner = handle.inner.lock().await;
    if let Some(bytes) = encode(&ServerMessage::RoomClosed(RoomClosedMsg {
        reason: reason.to_string(),
    })) {
        inner.broadcast(bytes);
    }
    inner.members.clear();
    tracing::info!(room = room_id, reason, "Room closed");
}

/// Remove rooms idle for longer than `max_idle`, notifying their members.
/// Returns the number of rooms removed.
pub async fn sweep_idle_rooms(registry: &SharedRegistry, max_idle: Duration) -> usize {
    let handles = {
        let reg = registry.read().await;
        reg.handles()
    };
    let now = Instant::now();
    let mut expired = Vec::new();
    for (room_id, handle) in handles {
        let inner = handle.inner.lock().await;
        if now.duration_since(inner.last_activity) >= max_idle {
            expired.push(room_id);
        }
    }
    for room_id in &expired {
        close_room(registry, room_id, "Game closed due to inactivity.").await;
    }
    expired.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackout_core::test_helpers::{small_config, token};
    use tokio::sync::RwLock;

    fn make_sender() -> (PlayerSender, mpsc::Receiver<Bytes>) {
        mpsc::channel(256)
    }

    fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(RoomRegistry::new()))
    }

    async fn create_room(registry: &SharedRegistry) -> (String, Arc<RoomHandle>) {
        let (tx, _rx) = make_sender();
        let mut reg = registry.write().await;
        reg.create_room(small_config(), token(1), token(0x1001), "Host", tx)
            .unwrap()
    }

    #[tokio::test]
    async fn create_room_returns_valid_code() {
        let registry = shared();
        let (room_id, handle) = create_room(&registry).await;
        assert!(blackout_core::room::is_valid_room_code(&room_id));
        let inner = handle.inner.lock().await;
        assert_eq!(inner.game.member_count(), 1);
        assert_eq!(inner.members.len(), 1);
    }

    #[tokio::test]
    async fn lobby_list_only_shows_joinable_rooms() {
        let registry = shared();
        let (room_id, handle) = create_room(&registry).await;

        let listing = lobby_list(&registry).await;
        assert_eq!(listing.rooms.len(), 1);
        assert_eq!(listing.rooms[0].room_id, room_id);
        assert_eq!(listing.rooms[0].host_name, "Host");

        // Fill the room and start the game; it leaves the listing.
        {
            let mut inner = handle.inner.lock().await;
            for i in 2..=4u128 {
                inner
                    .game
                    .add_player(token(i), token(0x1000 + i), &format!("P{i}"))
                    .unwrap();
            }
            inner.game.start_game(token(1), token(0x1001)).unwrap();
        }
        let listing = lobby_list(&registry).await;
        assert!(listing.rooms.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let registry = shared();
        let (_, handle) = create_room(&registry).await;

        let (tx2, mut rx2) = make_sender();
        {
            let mut inner = handle.inner.lock().await;
            inner
                .game
                .add_player(token(2), token(0x1002), "Guest")
                .unwrap();
            inner.members.insert(token(2), tx2);
            inner.broadcast_snapshot();
        }

        let data = rx2.recv().await.expect("member should receive snapshot");
        let msg = blackout_core::net::protocol::decode_server_message(&data).unwrap();
        match msg {
            ServerMessage::RoomSnapshot(snap) => assert_eq!(snap.players.len(), 2),
            other => panic!("Expected RoomSnapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn find_player_room_by_token() {
        let registry = shared();
        let (room_id, _) = create_room(&registry).await;

        let found = find_player_room(&registry, token(1)).await;
        assert_eq!(found.map(|(id, _)| id), Some(room_id));
        assert!(find_player_room(&registry, token(99)).await.is_none());
    }

    #[tokio::test]
    async fn close_room_notifies_members() {
        let registry = shared();
        let (room_id, handle) = create_room(&registry).await;

        let (tx2, mut rx2) = make_sender();
        {
            let mut inner = handle.inner.lock().await;
            inner
                .game
                .add_player(token(2), token(0x1002), "Guest")
                .unwrap();
            inner.members.insert(token(2), tx2);
        }

        close_room(&registry, &room_id, "Host disconnected. Game aborted.").await;

        assert_eq!(registry.read().await.room_count(), 0);
        let data = rx2.recv().await.expect("member should be notified");
        let msg = blackout_core::net::protocol::decode_server_message(&data).unwrap();
        match msg {
            ServerMessage::RoomClosed(m) => {
                assert_eq!(m.reason, "Host disconnected. Game aborted.");
            },
            other => panic!("Expected RoomClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn idle_sweep_removes_stale_rooms() {
        let registry = shared();
        let (room_id1, handle1) = create_room(&registry).await;
        let (room_id2, _) = {
            let (tx, _rx) = make_sender();
            let mut reg = registry.write().await;
            reg.create_room(small_config(), token(5), token(0x1005), "Other", tx)
                .unwrap()
        };

        // Artificially age the first room.
        handle1.inner.lock().await.last_activity = Instant::now() - Duration::from_secs(7200);

        let removed = sweep_idle_rooms(&registry, Duration::from_secs(3600)).await;
        assert_eq!(removed, 1);
        let reg = registry.read().await;
        assert!(reg.get(&room_id1).is_none());
        assert!(reg.get(&room_id2).is_some());
    }
}
