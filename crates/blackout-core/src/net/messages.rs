use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};
use crate::room::{PhaseState, RoleCounts, RoomConfig};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    Reconnect = 0x03,
    StartGame = 0x04,
    AcknowledgeRole = 0x05,
    SelectTarget = 0x06,
    CastVote = 0x07,
    HostAdvance = 0x08,
    CloseRoom = 0x09,

    // Server -> Client
    JoinResponse = 0x10,
    RoomSnapshot = 0x11,
    LobbyList = 0x12,
    ActionRejected = 0x13,
    InvestigationResult = 0x14,
    RoomClosed = 0x15,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::CreateRoom),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::Reconnect),
            0x04 => Some(Self::StartGame),
            0x05 => Some(Self::AcknowledgeRole),
            0x06 => Some(Self::SelectTarget),
            0x07 => Some(Self::CastVote),
            0x08 => Some(Self::HostAdvance),
            0x09 => Some(Self::CloseRoom),
            0x10 => Some(Self::JoinResponse),
            0x11 => Some(Self::RoomSnapshot),
            0x12 => Some(Self::LobbyList),
            0x13 => Some(Self::ActionRejected),
            0x14 => Some(Self::InvestigationResult),
            0x15 => Some(Self::RoomClosed),
            _ => None,
        }
    }
}

/// The host-driven phase advancement commands. One message type covers all
/// confirm/advance buttons on the moderator screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostAction {
    BeginNight,
    ConfirmTerrorist,
    ConfirmPolice,
    ConfirmDoctor,
    StartDiscussion,
    StartVoting,
    FinalizeVote,
    NextRound,
}

// ---- Client -> Server ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub game_name: String,
    pub host_name: String,
    pub roles: RoleCounts,
    /// Durable identity for the host, minted by the client.
    pub player_token: PlayerId,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_id: String,
    pub player_name: String,
    pub player_token: PlayerId,
    pub protocol_version: u8,
}

/// Rebind a fresh connection to an existing seat. Unlike JoinRoom this
/// carries no name and no room id; the server finds the seat by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectMsg {
    pub player_token: PlayerId,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameMsg {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgeRoleMsg {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectTargetMsg {
    pub target: PlayerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVoteMsg {
    pub target: PlayerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAdvanceMsg {
    pub action: HostAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseRoomMsg {}

// ---- Server -> Client ------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponseMsg {
    pub success: bool,
    pub room_id: Option<String>,
    pub player_id: Option<PlayerId>,
    pub error: Option<String>,
}

impl JoinResponseMsg {
    pub fn ok(room_id: String, player_id: PlayerId) -> Self {
        Self {
            success: true,
            room_id: Some(room_id),
            player_id: Some(player_id),
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            success: false,
            room_id: None,
            player_id: None,
            error: Some(message),
        }
    }
}

/// The complete room state, broadcast to every member after any accepted
/// mutation. Clients render from this alone and never accumulate deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshotMsg {
    pub room_id: String,
    pub config: RoomConfig,
    pub phase: PhaseState,
    pub players: Vec<Player>,
    pub round: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyRoomEntry {
    pub room_id: String,
    pub name: String,
    pub host_name: String,
    pub member_count: usize,
}

/// All joinable rooms, pushed to every connection whenever the set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyListMsg {
    pub rooms: Vec<LobbyRoomEntry>,
}

/// Sent only to the connection whose action was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRejectedMsg {
    pub reason: String,
}

/// Investigation outcome, sent privately to the acting police player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationResultMsg {
    pub target: PlayerId,
    pub is_terrorist: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomClosedMsg {
    pub reason: String,
}

// ---- Envelopes -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    Reconnect(ReconnectMsg),
    StartGame(StartGameMsg),
    AcknowledgeRole(AcknowledgeRoleMsg),
    SelectTarget(SelectTargetMsg),
    CastVote(CastVoteMsg),
    HostAdvance(HostAdvanceMsg),
    CloseRoom(CloseRoomMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateRoom(_) => MessageType::CreateRoom,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::Reconnect(_) => MessageType::Reconnect,
            Self::StartGame(_) => MessageType::StartGame,
            Self::AcknowledgeRole(_) => MessageType::AcknowledgeRole,
            Self::SelectTarget(_) => MessageType::SelectTarget,
            Self::CastVote(_) => MessageType::CastVote,
            Self::HostAdvance(_) => MessageType::HostAdvance,
            Self::CloseRoom(_) => MessageType::CloseRoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    JoinResponse(JoinResponseMsg),
    RoomSnapshot(Box<RoomSnapshotMsg>),
    LobbyList(LobbyListMsg),
    ActionRejected(ActionRejectedMsg),
    InvestigationResult(InvestigationResultMsg),
    RoomClosed(RoomClosedMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinResponse(_) => MessageType::JoinResponse,
            Self::RoomSnapshot(_) => MessageType::RoomSnapshot,
            Self::LobbyList(_) => MessageType::LobbyList,
            Self::ActionRejected(_) => MessageType::ActionRejected,
            Self::InvestigationResult(_) => MessageType::InvestigationResult,
            Self::RoomClosed(_) => MessageType::RoomClosed,
        }
    }
}
