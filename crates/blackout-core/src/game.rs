use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use crate::error::ActionError;
use crate::net::messages::{LobbyRoomEntry, RoomSnapshotMsg};
use crate::player::{ConnectionId, Player, PlayerId};
use crate::role::{RoleId, Team};
use crate::room::{NightActions, PhaseState, RoomConfig};

/// How `add_player` resolved: a brand-new seat, or an existing seat rebound
/// to a fresh connection (the reconnection path).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Joined,
    Rebound,
}

/// What a connection drop means for the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The host left while the room was still in the lobby; the room is dead
    /// and the caller must destroy it.
    RoomAborted,
    /// A lobby player left; their seat was removed.
    LeftLobby(PlayerId),
    /// Mid-game drop; the seat is kept for reconnection, only the connected
    /// flag flipped.
    WentOffline(PlayerId),
    /// The connection was not bound to any seat (already superseded by a
    /// reconnect, or never joined).
    UnknownConnection,
}

/// The authoritative per-room game state machine. All mutations go through
/// the methods below; each either applies fully or rejects with an
/// [`ActionError`] and changes nothing.
#[derive(Debug, Clone)]
pub struct GameRoom {
    pub room_id: String,
    pub config: RoomConfig,
    pub phase: PhaseState,
    pub players: Vec<Player>,
    pub round: u32,
    pub message: String,
}

impl GameRoom {
    /// Create a room with its host seated. Validates the host name and the
    /// role configuration before anything is allocated.
    pub fn new(
        room_id: String,
        config: RoomConfig,
        host_id: PlayerId,
        host_conn: ConnectionId,
        host_name: &str,
    ) -> Result<Self, ActionError> {
        let host_name = validate_name(host_name)?;
        if config.roles.total() == 0 {
            return Err(ActionError::InvalidRoleCounts);
        }
        Ok(Self {
            room_id,
            config,
            phase: PhaseState::Lobby,
            players: vec![Player::host(host_id, host_conn, host_name)],
            round: 0,
            message: "Waiting for players...".to_string(),
        })
    }

    pub fn host_id(&self) -> PlayerId {
        // Invariant: exactly one host, seated at creation, never reassigned.
        self.players
            .iter()
            .find(|p| p.is_host)
            .map(|p| p.player_id)
            .expect("room always has a host")
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.player_id == id)
    }

    /// Number of seats, host included.
    pub fn member_count(&self) -> usize {
        self.players.len()
    }

    fn non_host_count(&self) -> usize {
        self.players.len() - 1
    }

    /// Resolve the actor's seat and verify the sending connection still owns
    /// it. A socket superseded by a reconnect fails here.
    fn authorized_seat(
        &self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<usize, ActionError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.player_id == actor)
            .ok_or(ActionError::PlayerNotFound)?;
        if self.players[idx].connection_id != conn {
            return Err(ActionError::StaleConnection);
        }
        Ok(idx)
    }

    fn require_host(&self, actor: PlayerId) -> Result<(), ActionError> {
        if self.host_id() == actor {
            Ok(())
        } else {
            Err(ActionError::NotHost)
        }
    }

    // ---- roster ----------------------------------------------------------

    /// Seat a player, or rebind an existing seat to a new connection.
    /// Rebinding succeeds in any phase; new seats only in the lobby and only
    /// while capacity remains.
    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        conn: ConnectionId,
        name: &str,
    ) -> Result<JoinKind, ActionError> {
        let name = validate_name(name)?;
        if let Some(p) = self.players.iter_mut().find(|p| p.player_id == player_id) {
            p.connection_id = conn;
            p.connected = true;
            p.display_name = name;
            return Ok(JoinKind::Rebound);
        }
        if !self.phase.is_lobby() {
            return Err(ActionError::GameInProgress);
        }
        if self.non_host_count() >= self.config.roles.total() {
            return Err(ActionError::RoomFull);
        }
        self.players.push(Player::joiner(player_id, conn, name));
        Ok(JoinKind::Joined)
    }

    /// Rebind a seat to a new connection without touching the display name.
    /// The previous connection's authority over this seat ends here.
    pub fn rebind(&mut self, player_id: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        let p = self
            .player_mut(player_id)
            .ok_or(ActionError::PlayerNotFound)?;
        p.connection_id = conn;
        p.connected = true;
        Ok(())
    }

    /// Handle a dropped connection. Looks the seat up by connection id, so a
    /// socket that was already superseded resolves to `UnknownConnection`
    /// and leaves the roster alone.
    pub fn disconnect(&mut self, conn: ConnectionId) -> DisconnectOutcome {
        let Some(idx) = self.players.iter().position(|p| p.connection_id == conn) else {
            return DisconnectOutcome::UnknownConnection;
        };
        let player_id = self.players[idx].player_id;
        if self.phase.is_lobby() {
            if self.players[idx].is_host {
                return DisconnectOutcome::RoomAborted;
            }
            self.players.remove(idx);
            DisconnectOutcome::LeftLobby(player_id)
        } else {
            self.players[idx].connected = false;
            DisconnectOutcome::WentOffline(player_id)
        }
    }

    // ---- phase machine ---------------------------------------------------

    /// LOBBY → ROLE_REVEAL: shuffle the configured role deck and deal one
    /// role per non-host seat, padding with Villager if the deck runs short.
    pub fn start_game(&mut self, actor: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        if !self.phase.is_lobby() {
            return Err(ActionError::WrongPhase);
        }
        let required = self.config.roles.total();
        if self.non_host_count() < required {
            return Err(ActionError::NotEnoughPlayers { required });
        }

        let mut deck = self.config.roles.deck();
        deck.shuffle(&mut rand::rng());
        let mut deal = deck.into_iter();
        for p in self.players.iter_mut().filter(|p| !p.is_host) {
            p.role = Some(deal.next().unwrap_or(RoleId::Villager));
            p.is_alive = true;
            p.role_acknowledged = false;
        }

        self.round = 1;
        self.phase = PhaseState::RoleReveal;
        Ok(())
    }

    /// Mark the actor's role as viewed. Idempotent.
    pub fn acknowledge_role(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        let idx = self.authorized_seat(actor, conn)?;
        if !matches!(self.phase, PhaseState::RoleReveal) {
            return Err(ActionError::WrongPhase);
        }
        if self.players[idx].is_host {
            return Err(ActionError::HostNotPlayer);
        }
        self.players[idx].role_acknowledged = true;
        Ok(())
    }

    /// ROLE_REVEAL → NIGHT_TERRORIST, once every player has seen their role.
    pub fn begin_night(&mut self, actor: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        if !matches!(self.phase, PhaseState::RoleReveal) {
            return Err(ActionError::WrongPhase);
        }
        if self
            .players
            .iter()
            .any(|p| !p.is_host && !p.role_acknowledged)
        {
            return Err(ActionError::RolesNotAcknowledged);
        }
        self.phase = PhaseState::NightTerrorist {
            actions: NightActions::default(),
        };
        Ok(())
    }

    /// Record the acting role's night selection. For the police this also
    /// returns whether the investigated target holds the Terrorist role,
    /// which the caller reveals privately to the acting player only.
    pub fn select_target(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
        target: PlayerId,
    ) -> Result<Option<bool>, ActionError> {
        let idx = self.authorized_seat(actor, conn)?;
        let acting = &self.players[idx];
        if acting.is_host {
            return Err(ActionError::HostNotPlayer);
        }
        if !acting.is_alive {
            return Err(ActionError::NotAlive);
        }
        let role = acting.role;

        let target_seat = self
            .players
            .iter()
            .find(|p| p.player_id == target && !p.is_host)
            .ok_or(ActionError::UnknownTarget)?;
        let target_is_terrorist = target_seat.role == Some(RoleId::Terrorist);

        match &mut self.phase {
            PhaseState::NightTerrorist { actions } => {
                if role != Some(RoleId::Terrorist) {
                    return Err(ActionError::WrongRole);
                }
                actions.terrorist_selection = Some(target);
                Ok(None)
            },
            PhaseState::NightPolice { actions } => {
                if role != Some(RoleId::Police) {
                    return Err(ActionError::WrongRole);
                }
                actions.police_selection = Some(target);
                Ok(Some(target_is_terrorist))
            },
            PhaseState::NightDoctor { actions } => {
                if role != Some(RoleId::Doctor) {
                    return Err(ActionError::WrongRole);
                }
                actions.doctor_selection = Some(target);
                Ok(None)
            },
            _ => Err(ActionError::WrongPhase),
        }
    }

    /// NIGHT_TERRORIST → NIGHT_POLICE.
    pub fn confirm_terrorist(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        let actions = match &self.phase {
            PhaseState::NightTerrorist { actions } => actions.clone(),
            _ => return Err(ActionError::WrongPhase),
        };
        self.phase = PhaseState::NightPolice { actions };
        Ok(())
    }

    /// NIGHT_POLICE → NIGHT_DOCTOR.
    pub fn confirm_police(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        let actions = match &self.phase {
            PhaseState::NightPolice { actions } => actions.clone(),
            _ => return Err(ActionError::WrongPhase),
        };
        self.phase = PhaseState::NightDoctor { actions };
        Ok(())
    }

    /// NIGHT_DOCTOR → DAY_ANNOUNCE: resolve the night. The terrorist's
    /// target dies unless the doctor picked the same player. The win check
    /// runs before this returns, so callers never broadcast a dead-player
    /// state that is about to become GAME_OVER.
    pub fn confirm_doctor(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        let actions = match &self.phase {
            PhaseState::NightDoctor { actions } => actions.clone(),
            _ => return Err(ActionError::WrongPhase),
        };

        let victim = match actions.terrorist_selection {
            Some(t) if actions.doctor_selection != Some(t) => Some(t),
            _ => None,
        };
        if let Some(v) = victim
            && let Some(p) = self.player_mut(v)
        {
            p.is_alive = false;
        }

        self.phase = PhaseState::DayAnnounce { victim };
        self.check_win();
        Ok(())
    }

    /// DAY_ANNOUNCE → DAY_DISCUSSION.
    pub fn start_discussion(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        if !matches!(self.phase, PhaseState::DayAnnounce { .. }) {
            return Err(ActionError::WrongPhase);
        }
        self.phase = PhaseState::DayDiscussion;
        Ok(())
    }

    /// DAY_DISCUSSION → DAY_VOTE with an empty ballot box.
    pub fn start_voting(&mut self, actor: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        if !matches!(self.phase, PhaseState::DayDiscussion) {
            return Err(ActionError::WrongPhase);
        }
        self.phase = PhaseState::DayVote {
            votes: BTreeMap::new(),
        };
        Ok(())
    }

    /// Record (or overwrite) the actor's vote.
    pub fn cast_vote(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
        target: PlayerId,
    ) -> Result<(), ActionError> {
        let idx = self.authorized_seat(actor, conn)?;
        let voter = &self.players[idx];
        if voter.is_host {
            return Err(ActionError::HostNotPlayer);
        }
        if !voter.is_alive {
            return Err(ActionError::NotAlive);
        }
        if !self
            .players
            .iter()
            .any(|p| p.player_id == target && !p.is_host)
        {
            return Err(ActionError::UnknownTarget);
        }
        match &mut self.phase {
            PhaseState::DayVote { votes } => {
                votes.insert(actor, target);
                Ok(())
            },
            _ => Err(ActionError::WrongPhase),
        }
    }

    /// DAY_VOTE → DAY_ELIMINATION on a strict plurality leader, or back to
    /// DAY_DISCUSSION on a tie or an empty ballot box. The outcome is
    /// reproducible from the recorded vote map alone.
    pub fn finalize_vote(
        &mut self,
        actor: PlayerId,
        conn: ConnectionId,
    ) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        let votes = match &self.phase {
            PhaseState::DayVote { votes } => votes.clone(),
            _ => return Err(ActionError::WrongPhase),
        };

        match tally(&votes) {
            Some(eliminated) => {
                if let Some(p) = self.player_mut(eliminated) {
                    p.is_alive = false;
                }
                self.phase = PhaseState::DayElimination { eliminated };
            },
            None => {
                self.message = "Tie vote. No one eliminated.".to_string();
                self.phase = PhaseState::DayDiscussion;
            },
        }
        self.check_win();
        Ok(())
    }

    /// DAY_ELIMINATION → NIGHT_TERRORIST: next round, fresh night sub-state.
    pub fn next_round(&mut self, actor: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)?;
        if !matches!(self.phase, PhaseState::DayElimination { .. }) {
            return Err(ActionError::WrongPhase);
        }
        self.round += 1;
        self.phase = PhaseState::NightTerrorist {
            actions: NightActions::default(),
        };
        Ok(())
    }

    /// Verify that the actor may close this room (host-only; any phase).
    pub fn authorize_close(&self, actor: PlayerId, conn: ConnectionId) -> Result<(), ActionError> {
        self.authorized_seat(actor, conn)?;
        self.require_host(actor)
    }

    /// Evaluate the win condition and move to GAME_OVER if met. Called
    /// inside every death-causing transition, before any caller can observe
    /// the intermediate state.
    fn check_win(&mut self) {
        let terrorists = self
            .players
            .iter()
            .filter(|p| !p.is_host && p.is_alive && p.role == Some(RoleId::Terrorist))
            .count();
        let others = self
            .players
            .iter()
            .filter(|p| !p.is_host && p.is_alive && p.role != Some(RoleId::Terrorist))
            .count();

        if terrorists == 0 {
            self.phase = PhaseState::GameOver { winner: Team::Good };
        } else if terrorists >= others {
            self.phase = PhaseState::GameOver { winner: Team::Bad };
        }
    }

    // ---- read side -------------------------------------------------------

    /// The full room state as broadcast to every member after an accepted
    /// mutation. Includes assigned roles; hiding them from clients is a
    /// non-goal.
    pub fn snapshot(&self) -> RoomSnapshotMsg {
        RoomSnapshotMsg {
            room_id: self.room_id.clone(),
            config: self.config.clone(),
            phase: self.phase.clone(),
            players: self.players.clone(),
            round: self.round,
            message: self.message.clone(),
        }
    }

    /// The lobby-listing entry for this room, if it is still joinable.
    pub fn lobby_entry(&self) -> Option<LobbyRoomEntry> {
        if !self.phase.is_lobby() {
            return None;
        }
        Some(LobbyRoomEntry {
            room_id: self.room_id.clone(),
            name: self.config.game_name.clone(),
            host_name: self
                .players
                .iter()
                .find(|p| p.is_host)
                .map(|p| p.display_name.clone())
                .unwrap_or_default(),
            member_count: self.players.len(),
        })
    }
}

/// Strict plurality: the single target with the most votes, or `None` on a
/// tie or when nobody voted.
fn tally(votes: &BTreeMap<PlayerId, PlayerId>) -> Option<PlayerId> {
    let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
    for target in votes.values() {
        *counts.entry(*target).or_default() += 1;
    }
    let max = counts.values().copied().max()?;
    let mut leaders = counts.iter().filter(|(_, c)| **c == max);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(*leader)
}

fn validate_name(name: &str) -> Result<String, ActionError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 32 || name.chars().any(|c| c.is_control()) {
        return Err(ActionError::InvalidName);
    }
    Ok(name.to_string())
}
