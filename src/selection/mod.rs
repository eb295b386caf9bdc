pub mod filters;
pub mod probability;

use crate::error::{Result, VotemapError};
use crate::host::MapCatalog;
use crate::models::gamemode::shorthand;
use crate::models::{MapEntry, PlayedHistory};
use filters::{ExclusionRule, SelectionContext};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a played map pushes map list entries towards the back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyGranularity {
    /// Every mode of the played map.
    MapOnly,
    MapAndMode,
    /// Every map of the played mode.
    ModeOnly,
}

impl RecencyGranularity {
    pub fn matches(self, played: &MapEntry, candidate: &MapEntry) -> bool {
        match self {
            RecencyGranularity::MapOnly => played.file_name == candidate.file_name,
            RecencyGranularity::MapAndMode => played.same_map_and_mode(candidate),
            RecencyGranularity::ModeOnly => played.gamemode == candidate.gamemode,
        }
    }
}

/// Inputs for one round of option generation.
pub struct SelectionRequest<'a> {
    pub map_list: &'a [MapEntry],
    pub history: &'a PlayedHistory,
    pub rules: &'a [ExclusionRule],
    pub context: SelectionContext<'a>,
    pub num_options: usize,
    pub randomness: u8,
    pub granularity: RecencyGranularity,
}

/// Keep the first occurrence of each (file name, gamemode) pair.
pub fn deduplicate(entries: Vec<MapEntry>) -> Vec<MapEntry> {
    let mut unique: Vec<MapEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if unique.iter().any(|kept| kept.same_map_and_mode(&entry)) {
            info!(
                "{} {} is listed more than once, removing duplicate",
                entry.file_name, entry.gamemode
            );
        } else {
            unique.push(entry);
        }
    }
    unique
}

/// Order candidates from least to most recently played. Walking history
/// oldest to newest, each played map moves its matches to the back.
pub fn recency_sort(
    mut candidates: Vec<MapEntry>,
    history: &PlayedHistory,
    granularity: RecencyGranularity,
) -> Vec<MapEntry> {
    for played in history.entries() {
        let (moved, kept): (Vec<MapEntry>, Vec<MapEntry>) = candidates
            .into_iter()
            .partition(|candidate| granularity.matches(played, candidate));
        candidates = kept;
        candidates.extend(moved);
    }
    candidates
}

/// Longest display name first, then alternate from the long and short ends:
/// `[L1, L2, L3, L4]` becomes `[L1, L4, L2, L3]`.
pub fn display_order<T, F>(mut items: Vec<T>, name_len: F) -> Vec<T>
where
    F: Fn(&T) -> usize,
{
    items.sort_by_key(|item| std::cmp::Reverse(name_len(item)));

    let mut ordered = Vec::with_capacity(items.len());
    let mut remaining: std::collections::VecDeque<T> = items.into();
    let mut take_front = true;
    while let Some(item) = if take_front {
        remaining.pop_front()
    } else {
        remaining.pop_back()
    } {
        ordered.push(item);
        take_front = !take_front;
    }
    ordered
}

/// Filter, deduplicate, recency-sort and sample the map list into the
/// ordered options of a new vote.
pub fn generate_options<R: Rng + ?Sized>(
    request: &SelectionRequest<'_>,
    catalog: &dyn MapCatalog,
    rng: &mut R,
) -> Result<Vec<MapEntry>> {
    let filtered = filters::apply(request.map_list, request.rules, &request.context);
    let unique = deduplicate(filtered);
    if unique.len() < 2 {
        return Err(VotemapError::InsufficientCandidates {
            available: unique.len(),
        });
    }

    let sorted = recency_sort(unique, request.history, request.granularity);
    for (i, entry) in sorted.iter().enumerate() {
        debug!(
            "Sorted: {} {} {}",
            i,
            catalog.display_name(&entry.file_name),
            shorthand(&entry.gamemode)
        );
    }

    let k = request.num_options.min(sorted.len());
    let picked = probability::sample_indices(sorted.len(), k, request.randomness, rng);
    if picked.len() < k {
        info!("Only {} of {} vote options could be sampled", picked.len(), k);
    }

    let chosen: Vec<MapEntry> = picked.into_iter().map(|i| sorted[i].clone()).collect();
    let options = display_order(chosen, |entry| {
        catalog.display_name(&entry.file_name).chars().count()
    });

    let summary: Vec<String> = options
        .iter()
        .map(|e| format!("{} {}", catalog.display_name(&e.file_name), shorthand(&e.gamemode)))
        .collect();
    info!("Votemap options: {}", summary.join(" | "));

    Ok(options)
}
