pub mod error;
pub mod game;
pub mod net;
pub mod player;
pub mod role;
pub mod room;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use uuid::Uuid;

    use crate::player::PlayerId;
    use crate::room::{RoleCounts, RoomConfig};

    /// Deterministic player token for test scripts.
    pub fn token(n: u128) -> PlayerId {
        Uuid::from_u128(n)
    }

    pub fn role_counts(terrorist: u8, police: u8, doctor: u8, villager: u8) -> RoleCounts {
        RoleCounts {
            terrorist,
            police,
            doctor,
            villager,
        }
    }

    /// A small room config: one terrorist, one doctor, one villager.
    pub fn small_config() -> RoomConfig {
        RoomConfig {
            game_name: "Test Game".to_string(),
            roles: role_counts(1, 0, 1, 1),
        }
    }
}
