use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::role::{RoleId, Team};

/// How many of each role the host configured for this room. The sum is the
/// lobby capacity (the host is not counted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub terrorist: u8,
    pub police: u8,
    pub doctor: u8,
    pub villager: u8,
}

impl RoleCounts {
    pub fn total(&self) -> usize {
        self.terrorist as usize + self.police as usize + self.doctor as usize + self.villager as usize
    }

    /// The role deck, unshuffled. Callers pad with Villager when dealing to
    /// more players than the deck covers.
    pub fn deck(&self) -> Vec<RoleId> {
        let mut deck = Vec::with_capacity(self.total());
        deck.extend(std::iter::repeat_n(RoleId::Terrorist, self.terrorist as usize));
        deck.extend(std::iter::repeat_n(RoleId::Police, self.police as usize));
        deck.extend(std::iter::repeat_n(RoleId::Doctor, self.doctor as usize));
        deck.extend(std::iter::repeat_n(RoleId::Villager, self.villager as usize));
        deck
    }
}

/// Room configuration, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub game_name: String,
    pub roles: RoleCounts,
}

/// Night-phase selections, reset at the start of every night cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightActions {
    pub terrorist_selection: Option<PlayerId>,
    pub police_selection: Option<PlayerId>,
    pub doctor_selection: Option<PlayerId>,
}

/// The room's phase together with the sub-state that is only meaningful in
/// that phase. Transitioning replaces the whole value, so a snapshot can
/// never show a phase with another phase's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    Lobby,
    RoleReveal,
    NightTerrorist { actions: NightActions },
    NightPolice { actions: NightActions },
    NightDoctor { actions: NightActions },
    DayAnnounce { victim: Option<PlayerId> },
    DayDiscussion,
    DayVote { votes: BTreeMap<PlayerId, PlayerId> },
    DayElimination { eliminated: PlayerId },
    GameOver { winner: Team },
}

impl PhaseState {
    pub fn is_lobby(&self) -> bool {
        matches!(self, PhaseState::Lobby)
    }

    /// Phase name as broadcast in snapshots, e.g. `NIGHT_POLICE`.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseState::Lobby => "LOBBY",
            PhaseState::RoleReveal => "ROLE_REVEAL",
            PhaseState::NightTerrorist { .. } => "NIGHT_TERRORIST",
            PhaseState::NightPolice { .. } => "NIGHT_POLICE",
            PhaseState::NightDoctor { .. } => "NIGHT_DOCTOR",
            PhaseState::DayAnnounce { .. } => "DAY_ANNOUNCE",
            PhaseState::DayDiscussion => "DAY_DISCUSSION",
            PhaseState::DayVote { .. } => "DAY_VOTE",
            PhaseState::DayElimination { .. } => "DAY_ELIMINATION",
            PhaseState::GameOver { .. } => "GAME_OVER",
        }
    }
}

/// Room ids are 6-character uppercase base-36 codes, e.g. `K4TB09`.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random room code. Uniqueness among live rooms is the
/// registry's job; it re-draws on collision.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN
        && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_counts_total_and_deck() {
        let counts = RoleCounts {
            terrorist: 2,
            police: 1,
            doctor: 1,
            villager: 3,
        };
        assert_eq!(counts.total(), 7);
        let deck = counts.deck();
        assert_eq!(deck.len(), 7);
        assert_eq!(deck.iter().filter(|r| **r == RoleId::Terrorist).count(), 2);
        assert_eq!(deck.iter().filter(|r| **r == RoleId::Villager).count(), 3);
    }

    #[test]
    fn room_code_format() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "Invalid room code: {code}");
        }
    }

    #[test]
    fn room_code_rejects_bad_input() {
        assert!(!is_valid_room_code(""));
        assert!(!is_valid_room_code("abc123"));
        assert!(!is_valid_room_code("TOOLONG1"));
        assert!(!is_valid_room_code("AB-12!"));
    }

    #[test]
    fn phase_names_are_stable() {
        assert_eq!(PhaseState::Lobby.name(), "LOBBY");
        assert_eq!(
            PhaseState::NightTerrorist {
                actions: NightActions::default()
            }
            .name(),
            "NIGHT_TERRORIST"
        );
        assert_eq!(
            PhaseState::GameOver { winner: Team::Bad }.name(),
            "GAME_OVER"
        );
    }
}
