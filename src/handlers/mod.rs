pub mod announce;
mod vote;

pub use vote::VoteReceipt;

use crate::clock::{ClockSettings, RoundClock, VoteWindow};
use crate::config::{BannerMode, Trigger, VotemapConfig};
use crate::error::{Result, VotemapError};
use crate::host::{CommandSink, MapCatalog, PlayerDirectory, TaskAction};
use crate::models::gamemode::{GameModeFamily, shorthand};
use crate::models::{BroadcastScope, MapEntry, PlayedHistory, ServerSnapshot, is_last_round};
use crate::selection::filters::SelectionContext;
use crate::selection::{self, SelectionRequest};
use crate::voting::plurality;
use crate::voting::{TallyOutcome, TallyResult, TallyRules, VoteSession};
use announce::VOTING_ENDED;
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

const OPTIONS_DISPLAY_DELAY: u64 = 6;
const NEXT_MAP_DISPLAY_DELAY: u64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteState {
    Disabled,
    /// Last round, waiting for the vote window.
    Armed,
    Open,
    /// Vote finished for this round.
    Closed,
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoteState::Disabled => "disabled",
            VoteState::Armed => "armed",
            VoteState::Open => "open",
            VoteState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Answer to a status query.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: VoteState,
    pub enabled: bool,
    pub seconds_until_vote: Option<i64>,
    pub options: Vec<String>,
    pub next_map: Option<String>,
    pub current_map: String,
    pub player_count: usize,
}

/// Host side collaborators the scheduler talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub sink: Arc<dyn CommandSink>,
    pub catalog: Arc<dyn MapCatalog>,
    pub directory: Arc<dyn PlayerDirectory>,
}

fn vip_check(config: &VotemapConfig, directory: &dyn PlayerDirectory, name: &str) -> bool {
    config.vips.iter().any(|vip| vip == name)
        || (config.sync_reserved_slots && directory.is_vip(name))
}

/// The vote lifecycle. Owns every piece of per-round vote state and is
/// driven one event at a time by the engine loop.
pub struct Scheduler {
    config: VotemapConfig,
    clock: RoundClock,
    state: VoteState,
    enabled: bool,
    last_round: bool,
    window: Option<VoteWindow>,
    session: Option<VoteSession>,
    manual: bool,
    history: PlayedHistory,
    current_map: String,
    current_mode: String,
    player_count: usize,
    next_map: Option<String>,
    next_map_shown: bool,
    last_result: Option<TallyResult>,
    rng: StdRng,
    sink: Arc<dyn CommandSink>,
    catalog: Arc<dyn MapCatalog>,
    directory: Arc<dyn PlayerDirectory>,
}

impl Scheduler {
    pub fn new(config: VotemapConfig, hosts: Collaborators) -> Self {
        Self::with_rng(config, hosts, StdRng::from_entropy())
    }

    pub fn with_rng(config: VotemapConfig, hosts: Collaborators, rng: StdRng) -> Self {
        let clock = RoundClock::new(ClockSettings::from(&config));
        Self {
            config,
            clock,
            state: VoteState::Disabled,
            enabled: true,
            last_round: false,
            window: None,
            session: None,
            manual: false,
            history: PlayedHistory::new(),
            current_map: String::new(),
            current_mode: String::new(),
            player_count: 0,
            next_map: None,
            next_map_shown: false,
            last_result: None,
            rng,
            sink: hosts.sink,
            catalog: hosts.catalog,
            directory: hosts.directory,
        }
    }

    pub fn state(&self) -> VoteState {
        self.state
    }

    pub fn session(&self) -> Option<&VoteSession> {
        self.session.as_ref()
    }

    pub fn window(&self) -> Option<VoteWindow> {
        self.window
    }

    pub fn history(&self) -> &PlayedHistory {
        &self.history
    }

    pub fn last_result(&self) -> Option<&TallyResult> {
        self.last_result.as_ref()
    }

    pub fn next_map(&self) -> Option<&str> {
        self.next_map.as_deref()
    }

    // --- Outbound helpers ---

    fn dispatch(&self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("{} failed: {}", what, e);
        }
    }

    fn say(&self, text: &str, scope: &BroadcastScope) {
        self.dispatch("Broadcast", self.sink.broadcast(text, scope));
    }

    fn yell(&self, text: &str, scope: &BroadcastScope) {
        self.dispatch("Yell", self.sink.yell(text, self.config.yell_duration, scope));
    }

    fn schedule(&self, action: TaskAction, delay_secs: u64, interval_secs: u64) {
        self.dispatch(
            "Schedule task",
            self.sink
                .schedule_repeating(action.task_id(), delay_secs, interval_secs, action),
        );
    }

    fn cancel(&self, action: TaskAction) {
        self.dispatch("Cancel task", self.sink.cancel_task(action.task_id()));
    }

    fn cancel_display_tasks(&self) {
        self.cancel(TaskAction::ShowOptions);
        self.cancel(TaskAction::ShowBanner);
        self.cancel(TaskAction::ShowNextMap);
    }

    fn label(&self, entry: &MapEntry) -> String {
        announce::option_label(self.catalog.as_ref(), entry, self.config.show_gamemode)
    }

    fn players_in_range(&self) -> bool {
        (self.config.min_players..=self.config.max_players).contains(&self.player_count)
    }

    // --- Transitions ---

    fn arm(&mut self) {
        self.cancel_display_tasks();
        self.session = None;
        self.window = None;
        self.manual = false;
        // Counter stays: it is only sent when the server setting changes.
        self.clock.clear_samples();
        self.next_map = None;
        self.next_map_shown = false;
        self.last_result = None;
        self.state = VoteState::Armed;
        info!("Last round detected, voting system armed");
    }

    fn disable(&mut self, reason: &str) {
        self.cancel_display_tasks();
        if let Some(session) = self.session.take() {
            info!(
                "Discarding vote {} with {} ballot(s) without a tally",
                session.id,
                session.distinct_voters()
            );
        }
        self.window = None;
        self.manual = false;
        self.clock.clear_samples();
        self.state = VoteState::Disabled;
        info!("Voting system disabled: {}", reason);
    }

    pub fn level_loaded(
        &mut self,
        map: &str,
        gamemode: &str,
        rounds_played: u32,
        rounds_total: u32,
    ) {
        info!(
            "Level loaded: {} {}, Round {} of {}",
            self.catalog.display_name(map),
            shorthand(gamemode),
            rounds_played + 1,
            rounds_total
        );

        let list_index = self
            .catalog
            .current_list()
            .iter()
            .position(|e| e.file_name == map && e.gamemode == gamemode)
            .unwrap_or(0);
        self.history
            .record(MapEntry::new(map, gamemode, list_index, rounds_total));
        self.current_map = map.to_string();
        self.current_mode = gamemode.to_string();
        self.last_round = is_last_round(rounds_played, rounds_total);

        if !self.enabled {
            self.disable("votemap is switched off");
        } else if self.last_round {
            self.arm();
        } else {
            self.disable("not the last round");
        }
    }

    pub fn server_info(&mut self, snapshot: &ServerSnapshot, now: DateTime<Utc>) {
        self.player_count = snapshot.player_count;
        self.current_map = snapshot.map.clone();
        self.current_mode = snapshot.gamemode.clone();

        if !matches!(self.state, VoteState::Armed | VoteState::Open) {
            debug!("Skipping server info, voting system is {}", self.state);
            return;
        }
        if !snapshot.is_last_round() {
            self.last_round = false;
            debug!(
                "Rounds played: {}, total rounds: {}",
                snapshot.rounds_played, snapshot.rounds_total
            );
            self.disable("not the last round");
            return;
        }

        let window = match self.clock.observe(snapshot, now) {
            Ok(window) => window,
            Err(e) => {
                debug!("{}", e);
                return;
            }
        };

        let ticket_based =
            GameModeFamily::classify(&snapshot.gamemode) == GameModeFamily::TicketBased;
        match self.state {
            VoteState::Armed => self.window = Some(window),
            // Only score-driven estimates move an automatic vote's end
            VoteState::Open if !self.manual && ticket_based => {
                if let Some(current) = self.window.as_mut() {
                    current.end = window.end;
                }
                if let Some(session) = self.session.as_mut() {
                    let latest =
                        session.start_time + Duration::seconds(self.config.voting_duration);
                    session.end_time = latest.min(window.end);
                }
            }
            _ => {}
        }
    }

    pub fn game_mode_counter(&mut self, counter: i64) {
        self.clock.set_game_mode_counter(counter);
    }

    /// The server's next map index, used as the next map until a vote decides.
    pub fn map_indices(&mut self, next_index: usize) {
        if self.next_map.is_none() {
            let label = self
                .catalog
                .current_list()
                .get(next_index)
                .map(|entry| self.label(entry));
            self.next_map = label;
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        match self.state {
            VoteState::Armed => self.tick_armed(now),
            VoteState::Open => {
                if self.session.as_ref().is_some_and(|s| now > s.end_time) {
                    self.close_vote();
                }
            }
            VoteState::Disabled | VoteState::Closed => {}
        }
    }

    fn tick_armed(&mut self, now: DateTime<Utc>) {
        if self.config.trigger == Trigger::Manual {
            return;
        }
        // No estimate yet, wait for the next server info
        let Some(window) = self.window else {
            return;
        };
        let players_ok = self.players_in_range();

        // Announce the default next map once, in the minute before voting
        if self.config.show_next_map_before_vote
            && !self.next_map_shown
            && players_ok
            && now > window.start - Duration::minutes(1)
            && now < window.end
        {
            self.show_next_map(&BroadcastScope::All);
            self.next_map_shown = true;
        }

        if window.contains(now) {
            if !players_ok {
                debug!(
                    "{} players online, outside [{}, {}], not opening the vote",
                    self.player_count, self.config.min_players, self.config.max_players
                );
                return;
            }
            // The vote never outlives its duration, even if the round runs long
            let end = window
                .end
                .min(now + Duration::seconds(self.config.voting_duration));
            if let Err(e) = self.open_vote(now, end) {
                match e {
                    VotemapError::InsufficientCandidates { .. } => {
                        warn!("Not starting vote: {}", e)
                    }
                    other => error!("Failed to start vote: {}", other),
                }
            }
        } else if now >= window.end && !players_ok {
            // Window missed entirely: nothing to tally, the server picks the next map
            info!(
                "Player count stayed outside [{}, {}] through the vote window, no vote this round",
                self.config.min_players, self.config.max_players
            );
            self.state = VoteState::Closed;
        }
    }

    fn open_vote(&mut self, now: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        debug!("Voting poll: Starting...");
        let map_list = self.catalog.current_list();
        let request = SelectionRequest {
            map_list: &map_list,
            history: &self.history,
            rules: &self.config.exclusion_rules,
            context: SelectionContext {
                current_map: &self.current_map,
                current_mode: &self.current_mode,
                local_hour: now.with_timezone(&Local).hour(),
            },
            num_options: self.config.num_map_options,
            randomness: self.config.randomness,
            granularity: self.config.recency_granularity,
        };
        let options = selection::generate_options(&request, self.catalog.as_ref(), &mut self.rng)?;

        let session = VoteSession::new(options, now, end);
        info!(
            "Voting poll started: vote {} with {} options until {}",
            session.id,
            session.options().len(),
            end.format("%H:%M:%S")
        );
        self.session = Some(session);
        self.state = VoteState::Open;

        match self.config.banner {
            BannerMode::First => self.show_banner(),
            BannerMode::All => {
                self.schedule(TaskAction::ShowBanner, 0, self.config.options_interval)
            }
            BannerMode::Disabled => {}
        }
        self.schedule(
            TaskAction::ShowOptions,
            OPTIONS_DISPLAY_DELAY,
            self.config.options_interval,
        );
        Ok(())
    }

    /// Tally the open vote, announce it and apply the result.
    fn close_vote(&mut self) -> Option<TallyResult> {
        self.cancel(TaskAction::ShowOptions);
        self.cancel(TaskAction::ShowBanner);
        self.state = VoteState::Closed;
        // Already closed by an earlier event
        let session = self.session.take()?;

        let rules = TallyRules {
            vip_multiplier: self.config.vip_vote_multiplier,
            server_weighting: self.config.server_weighting,
            threshold: self.config.vote_threshold,
        };
        let config = &self.config;
        let directory = self.directory.as_ref();
        let result = plurality::tally(
            &session,
            &rules,
            |name: &str| vip_check(config, directory, name),
            self.player_count,
            &mut self.rng,
        );

        // Log the breakdown before announcing anything
        if self.player_count > 0 {
            info!(
                "Voting ended. {:.0}% of the players voted.",
                result.turnout * 100.0
            );
        }
        for count in &result.counts {
            if let Some(entry) = session.option(count.option) {
                info!(
                    "Votes: {} {}: {}",
                    self.catalog.display_name(&entry.file_name),
                    shorthand(&entry.gamemode),
                    count.weighted
                );
            }
        }

        self.say(VOTING_ENDED, &BroadcastScope::All);
        match result.outcome {
            TallyOutcome::Winner { option, .. } => {
                if let Some(entry) = session.option(option) {
                    let votes = result.counts.get(option).map(|c| c.weighted).unwrap_or(0);
                    let percent = result.percent(option);
                    self.apply_winner(entry, percent, votes, result.total_weighted);
                }
            }
            TallyOutcome::NoQuorum => self.apply_fallback(result.total_weighted),
        }

        self.last_result = Some(result.clone());
        Some(result)
    }

    fn apply_winner(&mut self, entry: &MapEntry, percent: f64, votes: u32, total: u32) {
        let label = self.label(entry);
        if !self.config.disable_results {
            let line = announce::winner_line(&label, percent, votes, total);
            if self.config.say_results {
                self.say(&line, &BroadcastScope::All);
            }
            if self.config.yell_results {
                self.yell(&line, &BroadcastScope::All);
            }
        }
        info!("{} Won", label);
        self.next_map = Some(label);

        if self.config.next_map_interval > 0 {
            self.schedule(
                TaskAction::ShowNextMap,
                NEXT_MAP_DISPLAY_DELAY,
                self.config.next_map_interval as u64,
            );
        }

        let index = self
            .catalog
            .current_list()
            .iter()
            .position(|e| e.same_map_and_mode(entry))
            .unwrap_or(0);
        self.dispatch("Set next map", self.sink.set_next_map(index));

        let args = [entry.file_name.clone(), entry.gamemode.clone()];
        for target in &self.config.dispatch_targets {
            match target.split_once('@') {
                Some((plugin, method)) => {
                    debug!("Calling {} to call {}", plugin, method);
                    self.dispatch("Plugin call", self.sink.call_plugin(plugin, method, &args));
                }
                None => warn!("Ignoring dispatch target {:?}, expected Plugin@Method", target),
            }
        }
    }

    fn apply_fallback(&mut self, total: u32) {
        self.say(
            &announce::vote_failed(total, self.config.vote_threshold),
            &BroadcastScope::All,
        );
        let reason = VotemapError::NoQuorum {
            total,
            threshold: self.config.vote_threshold,
        };
        info!("Votemap failed: {}, first map in the list is next", reason);
        self.dispatch("Set next map", self.sink.set_next_map(0));
        let first = self.catalog.current_list().first().map(|e| self.label(e));
        self.next_map = first;
    }

    fn stop_round(&mut self, reason: &str) -> Option<TallyResult> {
        match self.state {
            VoteState::Open => {
                self.cancel_display_tasks();
                self.close_vote()
            }
            VoteState::Closed => {
                self.cancel_display_tasks();
                None
            }
            VoteState::Armed | VoteState::Disabled => {
                self.disable(reason);
                None
            }
        }
    }

    pub fn round_over(&mut self) -> Option<TallyResult> {
        info!("Round over: stopping voting system");
        let result = self.stop_round("round over");
        if self.last_round {
            self.show_next_map(&BroadcastScope::All);
        }
        result
    }

    pub fn run_next_level(&mut self) -> Option<TallyResult> {
        info!("Skipped level: stopping voting system");
        self.stop_round("level skipped")
    }

    pub fn restart_level(&mut self) {
        info!("Level restarted: stopping voting system");
        self.disable("level restarted");
    }

    /// Open a vote right away, skipping the timing gate. The vote runs for
    /// exactly the voting duration.
    pub fn start_voting_poll(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            VoteState::Disabled => {
                info!("Ignoring manual vote, voting system is disabled");
                Ok(())
            }
            VoteState::Open => Err(VotemapError::InvalidTransition {
                action: "start a vote",
                state: self.state.to_string(),
            }),
            VoteState::Armed | VoteState::Closed => {
                let end = now + Duration::seconds(self.config.voting_duration);
                self.open_vote(now, end)?;
                self.manual = true;
                Ok(())
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            info!("Votemap enabled");
            if self.last_round && self.state == VoteState::Disabled {
                self.arm();
            }
        } else {
            self.disable("votemap switched off");
        }
    }

    // --- Displays ---

    pub fn run_task(&mut self, action: TaskAction) {
        match action {
            TaskAction::ShowOptions if self.state == VoteState::Open => {
                self.show_options(&BroadcastScope::All)
            }
            TaskAction::ShowBanner if self.state == VoteState::Open => self.show_banner(),
            TaskAction::ShowNextMap => self.show_next_map(&BroadcastScope::All),
            _ => debug!("Ignoring {:?}, vote is {}", action, self.state),
        }
    }

    /// Option lines as shown in chat, empty without an open vote.
    pub fn option_lines(&self) -> Vec<String> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let labels: Vec<String> = session.options().iter().map(|e| self.label(e)).collect();
        let counts: Option<Vec<u32>> = self.config.show_vote_counts.then(|| {
            let rules = TallyRules {
                vip_multiplier: self.config.vip_vote_multiplier,
                server_weighting: self.config.server_weighting,
                threshold: self.config.vote_threshold,
            };
            plurality::count_votes(session, &rules, |name: &str| {
                vip_check(&self.config, self.directory.as_ref(), name)
            })
            .iter()
            .map(|c| c.weighted)
            .collect()
        });
        announce::options_display(&self.config.vote_prefix, &labels, counts.as_deref())
    }

    fn show_options(&self, scope: &BroadcastScope) {
        for line in self.option_lines() {
            self.say(&line, scope);
        }
        debug!("Displayed voting options");
    }

    fn show_banner(&self) {
        if let Some(session) = &self.session {
            let waiting = self
                .directory
                .roster()
                .iter()
                .filter(|p| session.choice_of(&p.name).is_none())
                .count();
            debug!("{} player(s) have not voted yet", waiting);
        }
        if self.config.banner_type.yell() {
            self.yell(&self.config.banner_yell, &BroadcastScope::All);
        }
        if self.config.banner_type.chat() {
            for line in &self.config.banner_lines {
                self.say(line, &BroadcastScope::All);
            }
        }
        debug!("Displayed vote banner");
    }

    fn show_next_map(&self, scope: &BroadcastScope) {
        let Some(label) = &self.next_map else {
            debug!("Next map not known yet");
            return;
        };
        let text = announce::next_map(label);
        if self.config.say_next_map {
            self.say(&text, scope);
        }
        if self.config.yell_next_map {
            self.yell(&text, scope);
        }
    }

    /// A player asked for the options ("/v").
    pub fn request_options(&self, player: &str, now: DateTime<Utc>) {
        let scope = BroadcastScope::Player(player.to_string());
        info!("{} requested the map options", player);
        match self.state {
            VoteState::Open => self.show_options(&scope),
            VoteState::Armed => self.say(
                &announce::no_vote_in_progress(player, self.seconds_until_vote(now)),
                &scope,
            ),
            VoteState::Disabled | VoteState::Closed => {
                self.say(&announce::voting_has_ended(player, self.next_map()), &scope)
            }
        }
    }

    /// A player asked for the next map ("/nextmap").
    pub fn request_next_map(&self, player: &str) {
        info!("{} requested the next map", player);
        self.show_next_map(&BroadcastScope::Player(player.to_string()));
    }

    fn seconds_until_vote(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.state {
            VoteState::Armed => self.window.map(|w| w.seconds_until_start(now)),
            _ => None,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> EngineStatus {
        EngineStatus {
            state: self.state,
            enabled: self.enabled,
            seconds_until_vote: self.seconds_until_vote(now),
            options: self.option_lines(),
            next_map: self.next_map.clone(),
            current_map: self.current_map.clone(),
            player_count: self.player_count,
        }
    }
}
