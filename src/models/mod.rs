pub mod gamemode;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the server's map list. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub file_name: String,
    pub gamemode: String,
    pub list_index: usize,
    pub rounds_total: u32,
}

impl MapEntry {
    pub fn new(file_name: &str, gamemode: &str, list_index: usize, rounds_total: u32) -> Self {
        Self {
            file_name: file_name.to_string(),
            gamemode: gamemode.to_string(),
            list_index,
            rounds_total,
        }
    }

    pub fn same_map_and_mode(&self, other: &MapEntry) -> bool {
        self.file_name == other.file_name && self.gamemode == other.gamemode
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamScore {
    pub team_id: u32,
    pub score: i64,
    #[serde(default)]
    pub winning_score: i64,
}

/// What the game server reports on each server-info poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub map: String,
    pub gamemode: String,
    /// Seconds since the round started.
    pub round_time: i64,
    pub team_scores: Vec<TeamScore>,
    pub player_count: usize,
    pub rounds_played: u32,
    pub rounds_total: u32,
}

impl ServerSnapshot {
    /// `rounds_total == 0` is reported by some servers and treated as a single round.
    pub fn is_last_round(&self) -> bool {
        is_last_round(self.rounds_played, self.rounds_total)
    }
}

pub fn is_last_round(rounds_played: u32, rounds_total: u32) -> bool {
    rounds_total == 0 || rounds_played + 1 >= rounds_total
}

/// Score observation for a single team, kept by the round clock between polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSample {
    pub team_id: u32,
    pub score: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub team_id: u32,
    pub squad_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastScope {
    All,
    Player(String),
}

/// Maps played so far, oldest first. Re-playing a map moves it to the end.
#[derive(Debug, Clone, Default)]
pub struct PlayedHistory {
    entries: Vec<MapEntry>,
}

impl PlayedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: MapEntry) {
        if let Some(pos) = self.entries.iter().position(|e| e.same_map_and_mode(&entry)) {
            self.entries.remove(pos);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
