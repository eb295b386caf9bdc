//! Collaborators backed by plain in-process state, fed by the host binary.

use crate::error::{Result, VotemapError};
use crate::host::{GameStateSource, MapCatalog, PlayerDirectory};
use crate::models::{MapEntry, PlayerInfo, ServerSnapshot};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

const LEVEL_NAMES: [(&str, &str); 22] = [
    ("MP_Abandoned", "Zavod 311"),
    ("MP_Damage", "Lancang Dam"),
    ("MP_Flooded", "Flood Zone"),
    ("MP_Journey", "Golmud Railway"),
    ("MP_Naval", "Paracel Storm"),
    ("MP_Prison", "Operation Locker"),
    ("MP_Resort", "Hainan Resort"),
    ("MP_Siege", "Siege of Shanghai"),
    ("MP_TheDish", "Rogue Transmission"),
    ("MP_Tremors", "Dawnbreaker"),
    ("XP0_Caspian", "Caspian Border 2014"),
    ("XP0_Firestorm", "Operation Firestorm 2014"),
    ("XP0_Metro", "Operation Metro 2014"),
    ("XP0_Oman", "Gulf of Oman 2014"),
    ("XP1_001", "Silk Road"),
    ("XP1_002", "Altai Range"),
    ("XP1_003", "Guilin Peaks"),
    ("XP1_004", "Dragon Pass"),
    ("XP2_001", "Lost Islands"),
    ("XP2_002", "Nansha Strike"),
    ("XP2_003", "Wave Breaker"),
    ("XP2_004", "Operation Mortar"),
];

/// Map list plus file name to display name lookup.
pub struct InMemoryCatalog {
    maps: RwLock<Vec<MapEntry>>,
    names: HashMap<String, String>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self {
            maps: RwLock::new(Vec::new()),
            names: LEVEL_NAMES
                .iter()
                .map(|(file, name)| (file.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl InMemoryCatalog {
    pub fn with_maps(maps: Vec<MapEntry>) -> Self {
        let catalog = Self::default();
        catalog.replace(maps);
        catalog
    }

    pub fn replace(&self, maps: Vec<MapEntry>) {
        let mut current = self.maps.write().unwrap_or_else(|e| e.into_inner());
        if !current.is_empty() && *current != maps {
            info!("Maplist change detected");
        }
        debug!("Maplist updated. There are {} maps currently in the maplist", maps.len());
        *current = maps;
    }
}

impl MapCatalog for InMemoryCatalog {
    fn current_list(&self) -> Vec<MapEntry> {
        self.maps.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn display_name(&self, file_name: &str) -> String {
        self.names
            .get(file_name)
            .cloned()
            .unwrap_or_else(|| file_name.to_string())
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    roster: RwLock<Vec<PlayerInfo>>,
    reserved: RwLock<HashSet<String>>,
}

impl InMemoryDirectory {
    pub fn set_roster(&self, players: Vec<PlayerInfo>) {
        *self.roster.write().unwrap_or_else(|e| e.into_inner()) = players;
    }

    /// Mirror the server's reserved slot list: names on it become VIPs and
    /// names no longer on it lose VIP status.
    pub fn sync_reserved_slots(&self, names: Vec<String>) {
        let mut reserved = self.reserved.write().unwrap_or_else(|e| e.into_inner());
        let incoming: HashSet<String> = names.into_iter().collect();
        let added = incoming.difference(&reserved).count();
        let removed = reserved.difference(&incoming).count();
        if added > 0 || removed > 0 {
            debug!("Reserved slots synced: {} added, {} removed", added, removed);
        }
        *reserved = incoming;
    }
}

impl PlayerDirectory for InMemoryDirectory {
    fn roster(&self) -> Vec<PlayerInfo> {
        self.roster.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn is_vip(&self, name: &str) -> bool {
        self.reserved.read().unwrap_or_else(|e| e.into_inner()).contains(name)
    }
}

/// Holds the latest server info pushed by the host.
#[derive(Default)]
pub struct InMemoryGameState {
    latest: RwLock<Option<ServerSnapshot>>,
}

impl InMemoryGameState {
    pub fn update(&self, snapshot: ServerSnapshot) {
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }
}

#[async_trait]
impl GameStateSource for InMemoryGameState {
    async fn snapshot(&self) -> Result<ServerSnapshot> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| VotemapError::EstimationUnavailable {
                reason: "no server info received yet".to_string(),
            })
    }
}
