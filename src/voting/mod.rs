pub mod ballots;
pub mod plurality;

pub use ballots::VoteSession;

use serde::{Deserialize, Serialize};

/// Voter id used for ballots cast from the server console.
pub const SERVER_VOTER: &str = "Server";

/// Extra weight given to the console's ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerWeighting {
    /// The console counts `2 * multiplier - 1`, twice a VIP's bonus.
    Legacy,
    /// The console counts exactly like a VIP.
    AsVip,
}

/// Weighting and quorum settings applied when a vote closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyRules {
    pub vip_multiplier: u32,
    pub server_weighting: ServerWeighting,
    pub threshold: u32,
}

impl TallyRules {
    /// Total votes one ballot is worth.
    pub fn weight_of(&self, voter: &str, is_vip: bool) -> u32 {
        let bonus = self.vip_multiplier.saturating_sub(1);
        if voter == SERVER_VOTER {
            match self.server_weighting {
                ServerWeighting::Legacy => 1 + 2 * bonus,
                ServerWeighting::AsVip => 1 + bonus,
            }
        } else if is_vip {
            1 + bonus
        } else {
            1
        }
    }
}

// Votes for a single option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCount {
    /// Zero-based position in the session's options.
    pub option: usize,
    pub ballots: u32,
    pub weighted: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    Winner {
        option: usize,
        /// Every option that shared the top count, winner included. Empty
        /// when there was no tie.
        tied: Vec<usize>,
    },
    NoQuorum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TallyResult {
    pub outcome: TallyOutcome,
    pub counts: Vec<VoteCount>,
    pub total_weighted: u32,
    pub distinct_voters: usize,
    /// Distinct voters over players on the server. Informational only.
    pub turnout: f64,
}

impl TallyResult {
    pub fn winner(&self) -> Option<usize> {
        match self.outcome {
            TallyOutcome::Winner { option, .. } => Some(option),
            TallyOutcome::NoQuorum => None,
        }
    }

    /// Share of the weighted votes an option received, in percent.
    pub fn percent(&self, option: usize) -> f64 {
        if self.total_weighted == 0 {
            return 0.0;
        }
        self.counts
            .get(option)
            .map(|c| c.weighted as f64 * 100.0 / self.total_weighted as f64)
            .unwrap_or(0.0)
    }
}
