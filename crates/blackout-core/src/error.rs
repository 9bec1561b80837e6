use thiserror::Error;

/// Why a room rejected an inbound action. Every variant is local to the
/// originating request: nothing is mutated, and the rejection is reported
/// only to the connection that sent the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    // Validation: malformed input, rejected before any room state is touched.
    #[error("Player name is empty or invalid.")]
    InvalidName,
    #[error("Role counts must add up to at least one player.")]
    InvalidRoleCounts,

    // Preconditions: the action is well-formed but not valid right now.
    #[error("Lobby is Full!")]
    RoomFull,
    #[error("Game in Progress. Cannot join now.")]
    GameInProgress,
    #[error("That action is not valid in the current phase.")]
    WrongPhase,
    #[error("Only the host can do that.")]
    NotHost,
    #[error("The host does not take part in the game.")]
    HostNotPlayer,
    #[error("Dead players cannot act.")]
    NotAlive,
    #[error("Your role cannot perform that action.")]
    WrongRole,
    #[error("Need {required} players!")]
    NotEnoughPlayers { required: usize },
    #[error("Waiting for everyone to view their role.")]
    RolesNotAcknowledged,
    #[error("Another connection has taken over this player.")]
    StaleConnection,
    #[error("No such player in this room.")]
    UnknownTarget,

    // Not found: the client should fall back to the lobby listing.
    #[error("Game not found.")]
    RoomNotFound,
    #[error("Player not found.")]
    PlayerNotFound,
}
