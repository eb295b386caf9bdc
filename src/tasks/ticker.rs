use crate::commands::{EngineEvent, EngineHandle};
use crate::host::GameStateSource;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::{MissedTickBehavior, interval};

/// Drive the engine clock: a `Tick` every `tick_secs`, and a fresh server
/// snapshot every `server_info_secs`. Stops when the engine is gone.
pub async fn run_ticker(
    engine: EngineHandle,
    source: Arc<dyn GameStateSource>,
    tick_secs: u64,
    server_info_secs: u64,
) {
    info!(
        "Starting ticker: tick every {}s, server info every {}s",
        tick_secs, server_info_secs
    );
    let mut tick = interval(StdDuration::from_secs(tick_secs.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = interval(StdDuration::from_secs(server_info_secs.max(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            _ = tick.tick() => EngineEvent::Tick,
            _ = poll.tick() => match source.snapshot().await {
                Ok(snapshot) => EngineEvent::ServerInfo(snapshot),
                Err(e) => {
                    debug!("Server info unavailable: {}", e);
                    continue;
                }
            },
        };

        if engine.send(event).is_err() {
            warn!("Engine queue closed, stopping ticker");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::InMemoryGameState;
    use crate::models::ServerSnapshot;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_posts_ticks_and_snapshots() {
        let (handle, mut events) = EngineHandle::channel();
        let state = Arc::new(InMemoryGameState::default());
        state.update(ServerSnapshot {
            map: "MP_Siege".to_string(),
            gamemode: "ConquestLarge0".to_string(),
            round_time: 30,
            team_scores: vec![],
            player_count: 8,
            rounds_played: 0,
            rounds_total: 1,
        });

        let ticker = tokio::spawn(run_ticker(handle, state, 5, 20));

        let mut ticks = 0;
        let mut snapshots = 0;
        for _ in 0..8 {
            match events.recv().await {
                Some(EngineEvent::Tick) => ticks += 1,
                Some(EngineEvent::ServerInfo(s)) => {
                    assert_eq!(s.player_count, 8);
                    snapshots += 1;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert!(ticks >= 5);
        assert!(snapshots >= 1);

        drop(events);
        tokio::time::timeout(StdDuration::from_secs(30), ticker)
            .await
            .expect("ticker should stop once the engine is gone")
            .unwrap();
    }
}
