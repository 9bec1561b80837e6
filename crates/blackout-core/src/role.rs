use serde::{Deserialize, Serialize};

/// Team alignment, used for win-condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Team {
    Good,
    Bad,
}

/// Secret roles dealt to non-host players when the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleId {
    Terrorist,
    Police,
    Doctor,
    Villager,
}

/// Display metadata for a role, shown on the role-reveal screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    pub team: Team,
    pub display_name: &'static str,
    pub ability: &'static str,
    pub description: &'static str,
}

impl RoleId {
    pub const fn team(self) -> Team {
        match self {
            RoleId::Terrorist => Team::Bad,
            RoleId::Police | RoleId::Doctor | RoleId::Villager => Team::Good,
        }
    }

    pub const fn info(self) -> RoleInfo {
        match self {
            RoleId::Terrorist => RoleInfo {
                team: Team::Bad,
                display_name: "Terrorist",
                ability: "Kill",
                description: "Kill one villager every night.",
            },
            RoleId::Police => RoleInfo {
                team: Team::Good,
                display_name: "Police",
                ability: "Suspect",
                description: "Investigate one person every night.",
            },
            RoleId::Doctor => RoleInfo {
                team: Team::Good,
                display_name: "Doctor",
                ability: "Save",
                description: "Protect one person every night.",
            },
            RoleId::Villager => RoleInfo {
                team: Team::Good,
                display_name: "Villager",
                ability: "Vote",
                description: "Find the terrorists during the day.",
            },
        }
    }
}

/// Describe a possibly-unassigned role. A player with no role yet reads as a
/// plain Villager; this is a deliberate fallback, not an error.
pub const fn describe_role(role: Option<RoleId>) -> RoleInfo {
    match role {
        Some(r) => r.info(),
        None => RoleId::Villager.info(),
    }
}
