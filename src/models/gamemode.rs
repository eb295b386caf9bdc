use serde::{Deserialize, Serialize};

/// How the end of a round can be predicted for a given gamemode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameModeFamily {
    /// Round ends when a team's score crosses a threshold.
    TicketBased,
    /// Vote start is a configured offset from round start. Carrier Assault has
    /// its own offset.
    FixedOffset { carrier_assault: bool },
    Unrecognized,
}

impl GameModeFamily {
    pub fn classify(gamemode: &str) -> Self {
        const TICKET_BASED: [&str; 7] = [
            "Conquest",
            "DeathMatch",
            "Domination",
            "Superiority",
            "Scavenger",
            "Obliteration",
            "Chainlink",
        ];
        const FIXED_OFFSET: [&str; 4] = ["Rush", "GunMaster", "Capture", "Elimination"];

        if TICKET_BASED.iter().any(|m| gamemode.contains(m)) {
            GameModeFamily::TicketBased
        } else if FIXED_OFFSET.iter().any(|m| gamemode.contains(m)) {
            GameModeFamily::FixedOffset {
                carrier_assault: false,
            }
        } else if gamemode.contains("CarrierAssault") {
            GameModeFamily::FixedOffset {
                carrier_assault: true,
            }
        } else {
            GameModeFamily::Unrecognized
        }
    }
}

pub fn is_obliteration(gamemode: &str) -> bool {
    gamemode.contains("Obliteration")
}

/// Bracketed tag shown after a map name, e.g. `[CQ]`. Empty for unknown modes.
pub fn shorthand(gamemode: &str) -> &'static str {
    match gamemode {
        "Chainlink0" => "[CL]",
        "ConquestLarge0" | "ConquestSmall0" | "ConquestAssaultSmall0" | "ConquestAssaultSmall1"
        | "ConquestAssaultLarge0" => "[CQ]",
        "RushLarge0" => "[R]",
        "SquadRush0" => "[SQR]",
        "SquadDeathMatch0" => "[SQDM]",
        "TeamDeathMatch0" | "TeamDeathMatchC0" => "[TDM]",
        "Domination0" => "[DOM]",
        "Elimination0" => "[DF]",
        "TankSuperiority0" => "[TS]",
        "Scavenger0" => "[SC]",
        "CaptureTheFlag0" => "[CTF]",
        "AirSuperiority0" => "[AS]",
        "Obliteration" => "[OB]",
        "GunMaster0" => "[GM]",
        "CarrierAssaultLarge0" => "[CAL]",
        "CarrierAssaultSmall0" => "[CA]",
        "SquadObliteration0" => "[SQOB]",
        _ => "",
    }
}
