use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use trusty_votemap::host::console::{ConsoleSink, run_console_writer};
use trusty_votemap::host::memory::{InMemoryCatalog, InMemoryDirectory, InMemoryGameState};
use trusty_votemap::models::{MapEntry, PlayerInfo, ServerSnapshot};
use trusty_votemap::tasks::repeating::TaskRegistry;
use trusty_votemap::tasks::ticker::run_ticker;
use trusty_votemap::{
    Collaborators, EngineEvent, EngineHandle, Scheduler, VotemapConfig, run_engine,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Deserialize)]
struct MapListRow {
    file_name: String,
    gamemode: String,
    #[serde(default = "default_rounds")]
    rounds_total: u32,
}

fn default_rounds() -> u32 {
    1
}

/// One line of host input.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum HostEvent {
    LevelLoaded {
        map: String,
        gamemode: String,
        rounds_played: u32,
        rounds_total: u32,
    },
    ServerInfo(ServerSnapshot),
    GameModeCounter {
        value: i64,
    },
    MapList {
        maps: Vec<MapListRow>,
    },
    MapIndices {
        current: usize,
        next: usize,
    },
    ReservedSlots {
        names: Vec<String>,
    },
    Players {
        players: Vec<PlayerInfo>,
    },
    Vote {
        voter: String,
        option: usize,
    },
    ShowOptions {
        player: String,
    },
    NextMap {
        player: String,
    },
    RoundOver,
    RunNextLevel,
    RestartLevel,
    StartVotingPoll,
    SetEnabled {
        enabled: bool,
    },
    Status,
}

struct Host {
    engine: EngineHandle,
    catalog: Arc<InMemoryCatalog>,
    directory: Arc<InMemoryDirectory>,
    game_state: Arc<InMemoryGameState>,
    sync_reserved_slots: bool,
}

impl Host {
    async fn handle(&self, event: HostEvent) -> Result<(), BoxError> {
        match event {
            HostEvent::LevelLoaded {
                map,
                gamemode,
                rounds_played,
                rounds_total,
            } => self.engine.send(EngineEvent::LevelLoaded {
                map,
                gamemode,
                rounds_played,
                rounds_total,
            })?,
            HostEvent::ServerInfo(snapshot) => self.game_state.update(snapshot),
            HostEvent::GameModeCounter { value } => {
                self.engine.send(EngineEvent::GameModeCounter(value))?
            }
            HostEvent::MapList { maps } => {
                let entries = maps
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        MapEntry::new(&row.file_name, &row.gamemode, i, row.rounds_total)
                    })
                    .collect();
                self.catalog.replace(entries);
            }
            HostEvent::MapIndices { current, next } => {
                self.engine.send(EngineEvent::MapIndices { current, next })?
            }
            HostEvent::ReservedSlots { names } => {
                if self.sync_reserved_slots {
                    self.directory.sync_reserved_slots(names);
                }
            }
            HostEvent::Players { players } => self.directory.set_roster(players),
            HostEvent::Vote { voter, option } => {
                match self.engine.record_vote(&voter, option).await {
                    Ok(receipt) => debug!("Ballot from {}: {:?}", voter, receipt),
                    Err(e) => debug!("Ballot from {} rejected: {}", voter, e),
                }
            }
            HostEvent::ShowOptions { player } => {
                self.engine.send(EngineEvent::ShowOptions { player })?
            }
            HostEvent::NextMap { player } => self.engine.send(EngineEvent::ShowNextMap { player })?,
            HostEvent::RoundOver => self.engine.send(EngineEvent::RoundOver)?,
            HostEvent::RunNextLevel => self.engine.send(EngineEvent::RunNextLevel)?,
            HostEvent::RestartLevel => self.engine.send(EngineEvent::RestartLevel)?,
            HostEvent::StartVotingPoll => {
                if let Err(e) = self.engine.start_voting_poll().await {
                    warn!("Manual vote rejected: {}", e);
                }
            }
            HostEvent::SetEnabled { enabled } => {
                self.engine.send(EngineEvent::SetEnabled(enabled))?
            }
            HostEvent::Status => {
                let status = self.engine.status().await?;
                println!("{}", serde_json::to_string(&status)?);
            }
        }
        Ok(())
    }
}

async fn read_host_events(host: &Host) -> Result<(), BoxError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => host.handle(event).await?,
            Err(e) => warn!("Ignoring malformed host event: {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match VotemapConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    let (engine, events) = EngineHandle::channel();
    let catalog = Arc::new(InMemoryCatalog::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let game_state = Arc::new(InMemoryGameState::default());
    let (lines_tx, lines_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(run_console_writer(lines_rx, tokio::io::stdout()));
    let sink = Arc::new(ConsoleSink::new(TaskRegistry::new(engine.clone()), lines_tx));

    let scheduler = Scheduler::new(
        config.clone(),
        Collaborators {
            sink,
            catalog: catalog.clone(),
            directory: directory.clone(),
        },
    );
    let engine_task = tokio::spawn(run_engine(scheduler, events));
    let ticker_task = tokio::spawn(run_ticker(
        engine.clone(),
        game_state.clone(),
        config.tick_interval,
        config.server_info_interval,
    ));

    let host = Host {
        engine: engine.clone(),
        catalog,
        directory,
        game_state,
        sync_reserved_slots: config.sync_reserved_slots,
    };

    tokio::select! {
        result = read_host_events(&host) => match result {
            Ok(()) => info!("Host input closed, shutting down"),
            Err(e) => error!("Host input failed: {}", e),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    ticker_task.abort();
    if engine.shutdown().is_ok() {
        match engine_task.await {
            // Dropping the scheduler drops the sink, which lets the writer drain and exit
            Ok(scheduler) => drop(scheduler),
            Err(e) => error!("Engine task panicked: {}", e),
        }
    }
    if let Err(e) = writer_task.await {
        error!("Console writer panicked: {}", e);
    }
}
