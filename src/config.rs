use crate::error::{Result, VotemapError};
use crate::selection::RecencyGranularity;
use crate::selection::filters::ExclusionRule;
use crate::voting::ServerWeighting;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerMode {
    Disabled,
    /// Banner once when the vote opens.
    First,
    /// Banner before every options display.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerType {
    Chat,
    Yell,
    Both,
}

impl BannerType {
    pub fn chat(self) -> bool {
        matches!(self, BannerType::Chat | BannerType::Both)
    }

    pub fn yell(self) -> bool {
        matches!(self, BannerType::Yell | BannerType::Both)
    }
}

/// All tunables of the vote engine. Times are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotemapConfig {
    // Voting
    pub trigger: Trigger,
    pub voting_duration: i64,
    pub vote_threshold: u32,
    pub stop_vote_buffer: i64,
    pub fixed_offset: i64,
    pub carrier_assault_offset: i64,
    pub end_time_leeway: i64,
    pub round_time_limit: i64,
    pub min_players: usize,
    pub max_players: usize,
    pub vote_prefix: String,

    // Map options
    pub num_map_options: usize,
    pub randomness: u8,
    pub recency_granularity: RecencyGranularity,
    pub exclusion_rules: Vec<ExclusionRule>,

    // Vote weighting
    pub vips: Vec<String>,
    pub sync_reserved_slots: bool,
    pub vip_vote_multiplier: u32,
    pub server_weighting: ServerWeighting,

    // Display
    pub banner: BannerMode,
    pub banner_type: BannerType,
    pub banner_lines: Vec<String>,
    pub banner_yell: String,
    pub yell_duration: u32,
    pub options_interval: u64,
    pub next_map_interval: i64,
    pub show_next_map_before_vote: bool,
    pub show_gamemode: bool,
    pub show_vote_counts: bool,
    pub disable_results: bool,
    pub say_results: bool,
    pub yell_results: bool,
    pub say_next_map: bool,
    pub yell_next_map: bool,
    /// Public confirmation template; `%pn%` is the voter, `%map%` the choice.
    pub public_confirmation: Option<String>,

    /// `Plugin@Method` entries told about the winning map.
    pub dispatch_targets: Vec<String>,

    // Polling
    pub tick_interval: u64,
    pub server_info_interval: u64,
}

impl Default for VotemapConfig {
    fn default() -> Self {
        let mut banner_lines = vec!["%%%%%%%%%%%%%%%%%%%%%%%".to_string(); 10];
        banner_lines[2] = "%%%%       VOTE NEXT MAP       %%%%".to_string();
        banner_lines[7] = "%%%%       VOTE NEXT MAP       %%%%".to_string();

        Self {
            trigger: Trigger::Automatic,
            voting_duration: 300,
            vote_threshold: 1,
            stop_vote_buffer: 180,
            fixed_offset: 600,
            carrier_assault_offset: 600,
            end_time_leeway: 60,
            round_time_limit: 3300,
            min_players: 0,
            max_players: 70,
            vote_prefix: "/".to_string(),
            num_map_options: 4,
            randomness: 5,
            recency_granularity: RecencyGranularity::MapAndMode,
            exclusion_rules: vec![ExclusionRule::ExcludeCurrentMap {
                exempt: vec!["MP_Journey".to_string()],
            }],
            vips: Vec::new(),
            sync_reserved_slots: true,
            vip_vote_multiplier: 3,
            server_weighting: ServerWeighting::Legacy,
            banner: BannerMode::First,
            banner_type: BannerType::Both,
            banner_lines,
            banner_yell: "Vote Next Map Now!".to_string(),
            yell_duration: 5,
            options_interval: 60,
            next_map_interval: 600,
            show_next_map_before_vote: false,
            show_gamemode: true,
            show_vote_counts: true,
            disable_results: false,
            say_results: true,
            yell_results: false,
            say_next_map: true,
            yell_next_map: false,
            public_confirmation: None,
            dispatch_targets: Vec::new(),
            tick_interval: 5,
            server_info_interval: 20,
        }
    }
}

fn clamp_field<T>(field: &'static str, value: T, min: T, max: T) -> T
where
    T: Copy + PartialOrd + TryInto<i64>,
{
    if value >= min && value <= max {
        return value;
    }
    let as_i64 = |v: T| v.try_into().unwrap_or(i64::MAX);
    let err = VotemapError::ConfigOutOfRange {
        field,
        value: as_i64(value),
        min: as_i64(min),
        max: as_i64(max),
    };
    warn!("{}, clamping", err);
    if value < min { min } else { max }
}

impl VotemapConfig {
    /// Load from the JSON file named by `VOTEMAP_CONFIG` (if set), then apply
    /// `VOTEMAP_*` environment overrides, then clamp.
    pub fn from_env() -> Result<Self> {
        let base = match env::var("VOTEMAP_CONFIG") {
            Ok(path) => {
                info!("Loading votemap config from {}", path);
                let raw = fs::read_to_string(&path)
                    .map_err(|e| VotemapError::Config(format!("failed to read {}: {}", path, e)))?;
                Self::from_json(&raw)?
            }
            Err(_) => Self::default(),
        };

        base.with_overrides(|key| env::var(key).ok()).map(Self::clamped)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VotemapError::Config(format!("invalid config JSON: {}", e)))
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Result<T> {
            raw.trim()
                .parse()
                .map_err(|_| VotemapError::Config(format!("{} has an invalid value: {}", key, raw)))
        }

        if let Some(v) = lookup("VOTEMAP_VOTING_DURATION") {
            self.voting_duration = parse("VOTEMAP_VOTING_DURATION", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_VOTE_THRESHOLD") {
            self.vote_threshold = parse("VOTEMAP_VOTE_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_NUM_OPTIONS") {
            self.num_map_options = parse("VOTEMAP_NUM_OPTIONS", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_RANDOMNESS") {
            self.randomness = parse("VOTEMAP_RANDOMNESS", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_MIN_PLAYERS") {
            self.min_players = parse("VOTEMAP_MIN_PLAYERS", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_MAX_PLAYERS") {
            self.max_players = parse("VOTEMAP_MAX_PLAYERS", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_VIP_MULTIPLIER") {
            self.vip_vote_multiplier = parse("VOTEMAP_VIP_MULTIPLIER", v)?;
        }
        if let Some(v) = lookup("VOTEMAP_TRIGGER") {
            self.trigger = match v.trim().to_ascii_lowercase().as_str() {
                "automatic" => Trigger::Automatic,
                "manual" => Trigger::Manual,
                _ => {
                    return Err(VotemapError::Config(format!(
                        "VOTEMAP_TRIGGER has an invalid value: {}",
                        v
                    )));
                }
            };
        }
        Ok(self)
    }

    /// Force every bounded value back into its documented range.
    pub fn clamped(mut self) -> Self {
        self.num_map_options = clamp_field("num_map_options", self.num_map_options, 2, 14);
        self.randomness = clamp_field("randomness", self.randomness, 0, 10);
        self.voting_duration = clamp_field("voting_duration", self.voting_duration, 30, 3600);
        self.vote_threshold = clamp_field("vote_threshold", self.vote_threshold, 1, 1000);
        self.vip_vote_multiplier =
            clamp_field("vip_vote_multiplier", self.vip_vote_multiplier, 1, 10);
        self.tick_interval = clamp_field("tick_interval", self.tick_interval, 1, 60);
        self.server_info_interval =
            clamp_field("server_info_interval", self.server_info_interval, 1, 600);
        self.options_interval = clamp_field("options_interval", self.options_interval, 10, 3600);
        if self.min_players > self.max_players {
            warn!(
                "min_players ({}) exceeds max_players ({}), lowering min_players",
                self.min_players, self.max_players
            );
            self.min_players = self.max_players;
        }
        if self.vote_prefix.chars().count() != 1 {
            warn!("vote_prefix {:?} must be a single character, using \"/\"", self.vote_prefix);
            self.vote_prefix = "/".to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            VotemapConfig::from_json(r#"{ "randomness": 2, "trigger": "manual" }"#).unwrap();
        assert_eq!(config.randomness, 2);
        assert_eq!(config.trigger, Trigger::Manual);
        assert_eq!(config.voting_duration, 300);
        assert_eq!(config.num_map_options, 4);
        assert_eq!(config.exclusion_rules.len(), 1);
    }

    #[test]
    fn test_clamping_out_of_range_values() {
        let config = VotemapConfig {
            num_map_options: 40,
            randomness: 12,
            vote_threshold: 0,
            min_players: 80,
            max_players: 64,
            vote_prefix: "!!".to_string(),
            ..VotemapConfig::default()
        }
        .clamped();

        assert_eq!(config.num_map_options, 14);
        assert_eq!(config.randomness, 10);
        assert_eq!(config.vote_threshold, 1);
        assert_eq!(config.min_players, 64);
        assert_eq!(config.vote_prefix, "/");
    }

    #[test]
    fn test_env_style_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VOTEMAP_NUM_OPTIONS", "6"),
            ("VOTEMAP_TRIGGER", "Manual"),
            ("VOTEMAP_VIP_MULTIPLIER", " 2 "),
        ]
        .into_iter()
        .collect();

        let config = VotemapConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.num_map_options, 6);
        assert_eq!(config.trigger, Trigger::Manual);
        assert_eq!(config.vip_vote_multiplier, 2);
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let result = VotemapConfig::default().with_overrides(|key| {
            (key == "VOTEMAP_RANDOMNESS").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(VotemapError::Config(_))));
    }
}
