//! Round end prediction from score telemetry.

use crate::config::VotemapConfig;
use crate::error::{Result, VotemapError};
use crate::models::gamemode::{GameModeFamily, is_obliteration};
use crate::models::{ScoreSample, ServerSnapshot, TeamScore};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Seconds left once a single Obliteration bomb site remains.
const LAST_BOMB_SITE_SECONDS: f64 = 5.0;
/// Floor for the time to end once the hard limit is already reached.
const MIN_TIME_TO_END: i64 = 5;
pub const DEFAULT_GAME_MODE_COUNTER: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl VoteWindow {
    /// Negative once the start has passed.
    pub fn seconds_until_start(&self, now: DateTime<Utc>) -> i64 {
        (self.start - now).num_seconds()
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSettings {
    pub voting_duration: i64,
    pub stop_vote_buffer: i64,
    pub fixed_offset: i64,
    pub carrier_assault_offset: i64,
    pub end_time_leeway: i64,
    pub round_time_limit: i64,
}

impl From<&VotemapConfig> for ClockSettings {
    fn from(config: &VotemapConfig) -> Self {
        Self {
            voting_duration: config.voting_duration,
            stop_vote_buffer: config.stop_vote_buffer,
            fixed_offset: config.fixed_offset,
            carrier_assault_offset: config.carrier_assault_offset,
            end_time_leeway: config.end_time_leeway,
            round_time_limit: config.round_time_limit,
        }
    }
}

pub struct RoundClock {
    settings: ClockSettings,
    previous: Vec<ScoreSample>,
    game_mode_counter: i64,
}

impl RoundClock {
    pub fn new(settings: ClockSettings) -> Self {
        Self {
            settings,
            previous: Vec::new(),
            game_mode_counter: DEFAULT_GAME_MODE_COUNTER,
        }
    }

    /// Forget the previous score samples. The game mode counter is a server
    /// setting and survives across rounds.
    pub fn clear_samples(&mut self) {
        self.previous.clear();
    }

    pub fn set_game_mode_counter(&mut self, counter: i64) {
        debug!("Game mode counter set to {}", counter);
        self.game_mode_counter = counter;
    }

    /// Estimate the vote window from a fresh snapshot taken at `now`.
    pub fn observe(&mut self, snapshot: &ServerSnapshot, now: DateTime<Utc>) -> Result<VoteWindow> {
        match GameModeFamily::classify(&snapshot.gamemode) {
            GameModeFamily::TicketBased => {
                let time_to_end = self.ticket_time_to_end(snapshot, now);
                self.previous = snapshot
                    .team_scores
                    .iter()
                    .map(|team| ScoreSample {
                        team_id: team.team_id,
                        score: team.score,
                        timestamp: now,
                    })
                    .collect();

                let time_to_end = self.clamp_to_round_limit(time_to_end?, snapshot.round_time);
                let after_vote = self.settings.stop_vote_buffer - self.settings.end_time_leeway;
                let window = VoteWindow {
                    start: now + Duration::seconds(time_to_end - self.settings.voting_duration),
                    end: now + Duration::seconds(time_to_end + after_vote),
                };
                log_window(&window, now);
                Ok(window)
            }
            GameModeFamily::FixedOffset { carrier_assault } => {
                let offset = if carrier_assault {
                    self.settings.carrier_assault_offset
                } else {
                    self.settings.fixed_offset
                };
                let start = now + Duration::seconds(offset - snapshot.round_time);
                let window = VoteWindow {
                    start,
                    end: start + Duration::seconds(self.settings.voting_duration),
                };
                log_window(&window, now);
                Ok(window)
            }
            GameModeFamily::Unrecognized => {
                info!("Gamemode {} is not recognised, no vote window", snapshot.gamemode);
                Err(VotemapError::EstimationUnavailable {
                    reason: format!("unrecognised gamemode {}", snapshot.gamemode),
                })
            }
        }
    }

    fn target_score(&self, gamemode: &str, team: &TeamScore) -> i64 {
        if gamemode.contains("TeamDeathMatch") {
            self.game_mode_counter
        } else if gamemode.contains("SquadDeathMatch") {
            self.game_mode_counter / 2
        } else {
            team.winning_score
        }
    }

    /// Seconds until the vote must have ended, before the hard-limit clamp.
    fn ticket_time_to_end(&self, snapshot: &ServerSnapshot, now: DateTime<Utc>) -> Result<i64> {
        if self.previous.is_empty() {
            return Err(VotemapError::EstimationUnavailable {
                reason: "first score sample of the round".to_string(),
            });
        }

        let obliteration = is_obliteration(&snapshot.gamemode);
        let mut best: Option<f64> = None;

        for team in &snapshot.team_scores {
            let Some(prev) = self.previous.iter().find(|s| s.team_id == team.team_id) else {
                continue;
            };
            let elapsed = (now - prev.timestamp).num_milliseconds() as f64 / 1000.0;
            let rate = if elapsed > 0.0 {
                (team.score - prev.score) as f64 / elapsed
            } else {
                0.0
            };
            let target = self.target_score(&snapshot.gamemode, team);
            debug!(
                "Team {} score {}/{} rate {:.3}/s",
                team.team_id, team.score, target, rate
            );

            let remaining = if obliteration {
                (team.score == 1).then_some(LAST_BOMB_SITE_SECONDS)
            } else if rate != 0.0 {
                Some((target - team.score) as f64 / rate - self.settings.stop_vote_buffer as f64)
            } else {
                None
            };

            if let Some(remaining) = remaining {
                best = Some(best.map_or(remaining, |b| b.min(remaining)));
            }
        }

        best.map(|seconds| seconds.round() as i64)
            .ok_or_else(|| VotemapError::EstimationUnavailable {
                reason: "no score change since the last sample".to_string(),
            })
    }

    fn clamp_to_round_limit(&self, time_to_end: i64, round_time: i64) -> i64 {
        let used = round_time + self.settings.stop_vote_buffer + self.settings.voting_duration;
        let left = self.settings.round_time_limit - used;
        if left <= 0 {
            MIN_TIME_TO_END
        } else {
            time_to_end.min(left)
        }
    }
}

fn log_window(window: &VoteWindow, now: DateTime<Utc>) {
    let until = window.seconds_until_start(now);
    if until > 0 {
        info!(
            "Estimated voting start in {}s @ {}",
            until,
            window.start.format("%H:%M:%S")
        );
    } else {
        info!(
            "Estimated voting start {}s ago @ {}",
            -until,
            window.start.format("%H:%M:%S")
        );
    }
}
