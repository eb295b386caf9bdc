//! Messages into the engine and the loop that applies them.

use crate::error::{Result, VotemapError};
use crate::handlers::{EngineStatus, Scheduler, VoteReceipt};
use crate::host::TaskAction;
use crate::models::ServerSnapshot;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};

/// Everything that can change vote state. Processed strictly in arrival order.
#[derive(Debug)]
pub enum EngineEvent {
    LevelLoaded {
        map: String,
        gamemode: String,
        rounds_played: u32,
        rounds_total: u32,
    },
    ServerInfo(ServerSnapshot),
    GameModeCounter(i64),
    MapIndices {
        current: usize,
        next: usize,
    },
    Tick,
    RoundOver,
    RunNextLevel,
    RestartLevel,
    StartVotingPoll {
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    Vote {
        voter: String,
        option: usize,
        reply: Option<oneshot::Sender<Result<VoteReceipt>>>,
    },
    ShowOptions {
        player: String,
    },
    ShowNextMap {
        player: String,
    },
    SetEnabled(bool),
    RunTask(TaskAction),
    Status(oneshot::Sender<EngineStatus>),
    Shutdown,
}

/// Cloneable sender used by host callbacks, the ticker and repeating tasks.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event without waiting for it to be processed.
    pub fn send(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| VotemapError::EngineClosed)
    }

    pub async fn record_vote(&self, voter: &str, option: usize) -> Result<VoteReceipt> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::Vote {
            voter: voter.to_string(),
            option,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| VotemapError::EngineClosed)?
    }

    pub async fn start_voting_poll(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::StartVotingPoll { reply: Some(reply) })?;
        rx.await.map_err(|_| VotemapError::EngineClosed)?
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::Status(reply))?;
        rx.await.map_err(|_| VotemapError::EngineClosed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineEvent::Shutdown)
    }
}

/// Single consumer of the engine queue. Returns the scheduler once the queue
/// closes or a shutdown event arrives.
pub async fn run_engine(
    mut scheduler: Scheduler,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) -> Scheduler {
    info!("Vote engine started");
    while let Some(event) = events.recv().await {
        if matches!(event, EngineEvent::Shutdown) {
            break;
        }
        process_event(&mut scheduler, event, Utc::now());
    }
    info!("Vote engine stopped");
    scheduler
}

/// Apply one event to the scheduler.
pub fn process_event(scheduler: &mut Scheduler, event: EngineEvent, now: DateTime<Utc>) {
    match event {
        EngineEvent::LevelLoaded {
            map,
            gamemode,
            rounds_played,
            rounds_total,
        } => scheduler.level_loaded(&map, &gamemode, rounds_played, rounds_total),
        EngineEvent::ServerInfo(snapshot) => scheduler.server_info(&snapshot, now),
        EngineEvent::GameModeCounter(counter) => scheduler.game_mode_counter(counter),
        EngineEvent::MapIndices { current, next } => {
            debug!("Map indices: current {}, next {}", current, next);
            scheduler.map_indices(next);
        }
        EngineEvent::Tick => scheduler.tick(now),
        EngineEvent::RoundOver => {
            scheduler.round_over();
        }
        EngineEvent::RunNextLevel => {
            scheduler.run_next_level();
        }
        EngineEvent::RestartLevel => scheduler.restart_level(),
        EngineEvent::StartVotingPoll { reply } => {
            let result = scheduler.start_voting_poll(now);
            if let Err(e) = &result {
                error!("Manual vote not started: {}", e);
            }
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        EngineEvent::Vote { voter, option, reply } => {
            let result = scheduler.record_vote(&voter, option, now);
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        EngineEvent::ShowOptions { player } => scheduler.request_options(&player, now),
        EngineEvent::ShowNextMap { player } => scheduler.request_next_map(&player),
        EngineEvent::SetEnabled(enabled) => scheduler.set_enabled(enabled),
        EngineEvent::RunTask(action) => scheduler.run_task(action),
        EngineEvent::Status(reply) => {
            let _ = reply.send(scheduler.status(now));
        }
        EngineEvent::Shutdown => {}
    }
}
