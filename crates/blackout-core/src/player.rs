use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::RoleId;

/// Durable identity for a player. Supplied by the client and stable across
/// reconnects; this is the key the roster is reconciled on.
pub type PlayerId = Uuid;

/// Ephemeral identity for a single WebSocket connection. Rebound on every
/// reconnect; a roster record whose connection id no longer matches the
/// sending socket has been superseded.
pub type ConnectionId = Uuid;

/// One seat in a room: the host, or a playing member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    #[serde(skip)]
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub is_host: bool,
    pub is_alive: bool,
    pub role: Option<RoleId>,
    pub role_acknowledged: bool,
    pub connected: bool,
}

impl Player {
    /// The privileged seat created with the room. The host moderates and
    /// never receives a role.
    pub fn host(player_id: PlayerId, connection_id: ConnectionId, display_name: String) -> Self {
        Self {
            player_id,
            connection_id,
            display_name,
            is_host: true,
            is_alive: true,
            role: None,
            role_acknowledged: true,
            connected: true,
        }
    }

    /// A regular player joining the lobby.
    pub fn joiner(player_id: PlayerId, connection_id: ConnectionId, display_name: String) -> Self {
        Self {
            player_id,
            connection_id,
            display_name,
            is_host: false,
            is_alive: true,
            role: None,
            role_acknowledged: false,
            connected: true,
        }
    }
}
