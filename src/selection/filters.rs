use crate::models::MapEntry;
use crate::models::gamemode::shorthand;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicates that remove maps from the vote. Evaluated in declaration order
/// of the variants, whatever order they were configured in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ExclusionRule {
    ExcludeCurrentMap {
        #[serde(default)]
        exempt: Vec<String>,
    },
    ExcludeCurrentMode,
    ModeBlocklist {
        modes: Vec<String>,
    },
    /// Drop `maps` while the local hour is in `[from_hour, to_hour)`, wrapping
    /// past midnight. With `only_after`, the rule applies only when the current
    /// map is one of those.
    TimeOfDay {
        maps: Vec<String>,
        from_hour: u32,
        to_hour: u32,
        #[serde(default)]
        only_after: Option<Vec<String>>,
    },
}

/// What the server is playing right now, plus the local hour for time rules.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub current_map: &'a str,
    pub current_mode: &'a str,
    pub local_hour: u32,
}

fn hour_in_window(hour: u32, from: u32, to: u32) -> bool {
    match from.cmp(&to) {
        std::cmp::Ordering::Less => hour >= from && hour < to,
        std::cmp::Ordering::Greater => hour >= from || hour < to,
        std::cmp::Ordering::Equal => true,
    }
}

impl ExclusionRule {
    fn rank(&self) -> u8 {
        match self {
            ExclusionRule::ExcludeCurrentMap { .. } => 0,
            ExclusionRule::ExcludeCurrentMode => 1,
            ExclusionRule::ModeBlocklist { .. } => 2,
            ExclusionRule::TimeOfDay { .. } => 3,
        }
    }

    pub fn excludes(&self, entry: &MapEntry, ctx: &SelectionContext<'_>) -> bool {
        match self {
            ExclusionRule::ExcludeCurrentMap { exempt } => {
                entry.file_name == ctx.current_map && !exempt.iter().any(|m| *m == entry.file_name)
            }
            ExclusionRule::ExcludeCurrentMode => entry.gamemode == ctx.current_mode,
            ExclusionRule::ModeBlocklist { modes } => modes.iter().any(|m| *m == entry.gamemode),
            ExclusionRule::TimeOfDay {
                maps,
                from_hour,
                to_hour,
                only_after,
            } => {
                let after_ok = only_after
                    .as_ref()
                    .is_none_or(|prev| prev.iter().any(|m| m == ctx.current_map));
                after_ok
                    && maps.iter().any(|m| *m == entry.file_name)
                    && hour_in_window(ctx.local_hour, *from_hour, *to_hour)
            }
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionRule::ExcludeCurrentMap { .. } => write!(f, "current map"),
            ExclusionRule::ExcludeCurrentMode => write!(f, "current mode"),
            ExclusionRule::ModeBlocklist { .. } => write!(f, "mode blocklist"),
            ExclusionRule::TimeOfDay { from_hour, to_hour, .. } => {
                write!(f, "time of day {:02}:00-{:02}:00", from_hour, to_hour)
            }
        }
    }
}

/// Remove every entry that some rule excludes. The first matching rule in
/// declared order is the one reported.
pub fn apply(
    map_list: &[MapEntry],
    rules: &[ExclusionRule],
    ctx: &SelectionContext<'_>,
) -> Vec<MapEntry> {
    let mut ordered: Vec<&ExclusionRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.rank());

    map_list
        .iter()
        .filter(|entry| match ordered.iter().find(|rule| rule.excludes(entry, ctx)) {
            Some(rule) => {
                info!(
                    "{} {} was removed from the vote options ({})",
                    entry.file_name,
                    shorthand(&entry.gamemode),
                    rule
                );
                false
            }
            None => true,
        })
        .cloned()
        .collect()
}
