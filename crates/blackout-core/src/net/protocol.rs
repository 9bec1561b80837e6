use serde::{Deserialize, Serialize};

use super::messages::{
    AcknowledgeRoleMsg, ActionRejectedMsg, CastVoteMsg, ClientMessage, CloseRoomMsg,
    CreateRoomMsg, HostAdvanceMsg, InvestigationResultMsg, JoinResponseMsg, JoinRoomMsg,
    LobbyListMsg, MessageType, ReconnectMsg, RoomClosedMsg, RoomSnapshotMsg, SelectTargetMsg,
    ServerMessage, StartGameMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::Reconnect(m) => encode_message(MessageType::Reconnect, m),
        ClientMessage::StartGame(m) => encode_message(MessageType::StartGame, m),
        ClientMessage::AcknowledgeRole(m) => encode_message(MessageType::AcknowledgeRole, m),
        ClientMessage::SelectTarget(m) => encode_message(MessageType::SelectTarget, m),
        ClientMessage::CastVote(m) => encode_message(MessageType::CastVote, m),
        ClientMessage::HostAdvance(m) => encode_message(MessageType::HostAdvance, m),
        ClientMessage::CloseRoom(m) => encode_message(MessageType::CloseRoom, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinResponse(m) => encode_message(MessageType::JoinResponse, m),
        ServerMessage::RoomSnapshot(m) => encode_message(MessageType::RoomSnapshot, m.as_ref()),
        ServerMessage::LobbyList(m) => encode_message(MessageType::LobbyList, m),
        ServerMessage::ActionRejected(m) => encode_message(MessageType::ActionRejected, m),
        ServerMessage::InvestigationResult(m) => {
            encode_message(MessageType::InvestigationResult, m)
        },
        ServerMessage::RoomClosed(m) => encode_message(MessageType::RoomClosed, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::Reconnect => Ok(ClientMessage::Reconnect(decode_payload::<ReconnectMsg>(
            data,
        )?)),
        MessageType::StartGame => Ok(ClientMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::AcknowledgeRole => Ok(ClientMessage::AcknowledgeRole(decode_payload::<
            AcknowledgeRoleMsg,
        >(data)?)),
        MessageType::SelectTarget => Ok(ClientMessage::SelectTarget(
            decode_payload::<SelectTargetMsg>(data)?,
        )),
        MessageType::CastVote => Ok(ClientMessage::CastVote(decode_payload::<CastVoteMsg>(
            data,
        )?)),
        MessageType::HostAdvance => Ok(ClientMessage::HostAdvance(
            decode_payload::<HostAdvanceMsg>(data)?,
        )),
        MessageType::CloseRoom => Ok(ClientMessage::CloseRoom(decode_payload::<CloseRoomMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::JoinResponse => Ok(ServerMessage::JoinResponse(decode_payload::<
            JoinResponseMsg,
        >(data)?)),
        MessageType::RoomSnapshot => Ok(ServerMessage::RoomSnapshot(Box::new(decode_payload::<
            RoomSnapshotMsg,
        >(data)?))),
        MessageType::LobbyList => Ok(ServerMessage::LobbyList(decode_payload::<LobbyListMsg>(
            data,
        )?)),
        MessageType::ActionRejected => Ok(ServerMessage::ActionRejected(decode_payload::<
            ActionRejectedMsg,
        >(data)?)),
        MessageType::InvestigationResult => Ok(ServerMessage::InvestigationResult(
            decode_payload::<InvestigationResultMsg>(data)?,
        )),
        MessageType::RoomClosed => Ok(ServerMessage::RoomClosed(decode_payload::<RoomClosedMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::messages::HostAction;
    use crate::room::{NightActions, PhaseState, RoleCounts, RoomConfig};
    use uuid::Uuid;

    #[test]
    fn roundtrip_join_room() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_id: "K4TB09".to_string(),
            player_name: "Alice".to_string(),
            player_token: Uuid::from_u128(7),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::JoinRoom as u8);
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_host_advance() {
        let msg = ClientMessage::HostAdvance(HostAdvanceMsg {
            action: HostAction::ConfirmDoctor,
        });
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_room_snapshot() {
        let msg = ServerMessage::RoomSnapshot(Box::new(RoomSnapshotMsg {
            room_id: "K4TB09".to_string(),
            config: RoomConfig {
                game_name: "Friday Night".to_string(),
                roles: RoleCounts {
                    terrorist: 1,
                    police: 1,
                    doctor: 1,
                    villager: 2,
                },
            },
            phase: PhaseState::NightDoctor {
                actions: NightActions {
                    terrorist_selection: Some(Uuid::from_u128(3)),
                    police_selection: Some(Uuid::from_u128(4)),
                    doctor_selection: None,
                },
            },
            players: vec![],
            round: 2,
            message: "Waiting for players...".to_string(),
        }));
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_investigation_result() {
        let msg = ServerMessage::InvestigationResult(InvestigationResultMsg {
            target: Uuid::from_u128(9),
            is_terrorist: true,
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn decode_empty_message_fails() {
        assert!(decode_message_type(&[]).is_err());
    }

    #[test]
    fn decode_unknown_type_fails() {
        assert!(decode_message_type(&[0xFF]).is_err());
    }

    #[test]
    fn decode_client_msg_with_server_type_fails() {
        let msg = ServerMessage::ActionRejected(ActionRejectedMsg {
            reason: "Only the host can do that.".to_string(),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(decode_client_message(&encoded).is_err());
    }

    #[test]
    fn decode_server_msg_with_client_type_fails() {
        let msg = ClientMessage::CastVote(CastVoteMsg {
            target: Uuid::from_u128(1),
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert!(decode_server_message(&encoded).is_err());
    }

    #[test]
    fn message_type_from_byte_exhaustive() {
        for byte in 0u8..=255 {
            match MessageType::from_byte(byte) {
                Some(t) => assert_eq!(t as u8, byte),
                None => assert!(!matches!(byte, 0x01..=0x09 | 0x10..=0x15)),
            }
        }
    }

    #[test]
    fn protocol_error_display() {
        assert_eq!(format!("{}", ProtocolError::EmptyMessage), "empty message");
        assert_eq!(
            format!("{}", ProtocolError::UnknownMessageType(0xFF)),
            "unknown message type: 0xff"
        );
        assert!(format!("{}", ProtocolError::PayloadTooLarge(99999)).contains("99999"));
    }

    #[test]
    fn payload_too_large_rejected() {
        let msg = ServerMessage::ActionRejected(ActionRejectedMsg {
            reason: "x".repeat(MAX_MESSAGE_SIZE),
        });
        let result = encode_server_message(&msg);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge(_))));
    }
}
