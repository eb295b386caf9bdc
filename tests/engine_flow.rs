use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use trusty_votemap::commands::process_event;
use trusty_votemap::handlers::VoteReceipt;
use trusty_votemap::host::memory::{InMemoryCatalog, InMemoryDirectory};
use trusty_votemap::host::{CommandSink, TaskAction};
use trusty_votemap::models::{BroadcastScope, MapEntry, ServerSnapshot, TeamScore};
use trusty_votemap::voting::{SERVER_VOTER, ServerWeighting, TallyOutcome};
use trusty_votemap::{
    Collaborators, EngineEvent, EngineHandle, Result, Scheduler, VoteState, VotemapConfig,
    VotemapError, run_engine,
};

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Say(String, BroadcastScope),
    Yell(String),
    Schedule(String, u64, u64),
    Cancel(String),
    NextMap(usize),
    Plugin(String, String, Vec<String>),
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    fn push(&self, sent: Sent) -> Result<()> {
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn said_to_all(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Say(text, BroadcastScope::All) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn said_to(&self, player: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Say(text, BroadcastScope::Player(p)) if p == player => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn broadcast(&self, text: &str, scope: &BroadcastScope) -> Result<()> {
        self.push(Sent::Say(text.to_string(), scope.clone()))
    }

    fn yell(&self, text: &str, _duration_secs: u32, _scope: &BroadcastScope) -> Result<()> {
        self.push(Sent::Yell(text.to_string()))
    }

    fn schedule_repeating(
        &self,
        task_id: &str,
        delay_secs: u64,
        interval_secs: u64,
        _action: TaskAction,
    ) -> Result<()> {
        self.push(Sent::Schedule(task_id.to_string(), delay_secs, interval_secs))
    }

    fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.push(Sent::Cancel(task_id.to_string()))
    }

    fn set_next_map(&self, list_index: usize) -> Result<()> {
        self.push(Sent::NextMap(list_index))
    }

    fn call_plugin(&self, plugin: &str, method: &str, args: &[String]) -> Result<()> {
        self.push(Sent::Plugin(plugin.to_string(), method.to_string(), args.to_vec()))
    }
}

struct Harness {
    scheduler: Scheduler,
    sink: Arc<RecordingSink>,
    directory: Arc<InMemoryDirectory>,
}

fn map_list() -> Vec<MapEntry> {
    ["MP_Siege", "MP_Naval", "MP_Tremors", "MP_Abandoned", "MP_Flooded"]
        .iter()
        .enumerate()
        .map(|(i, file)| MapEntry::new(file, "ConquestLarge0", i, 1))
        .collect()
}

fn harness(config: VotemapConfig) -> Harness {
    let sink = Arc::new(RecordingSink::default());
    let directory = Arc::new(InMemoryDirectory::default());
    let hosts = Collaborators {
        sink: sink.clone(),
        catalog: Arc::new(InMemoryCatalog::with_maps(map_list())),
        directory: directory.clone(),
    };
    Harness {
        scheduler: Scheduler::with_rng(config, hosts, StdRng::seed_from_u64(2024)),
        sink,
        directory,
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap()
}

fn conquest(round_time: i64, team1: i64, team2: i64) -> ServerSnapshot {
    ServerSnapshot {
        map: "MP_Siege".to_string(),
        gamemode: "ConquestLarge0".to_string(),
        round_time,
        team_scores: vec![
            TeamScore {
                team_id: 1,
                score: team1,
                winning_score: 0,
            },
            TeamScore {
                team_id: 2,
                score: team2,
                winning_score: 0,
            },
        ],
        player_count: 24,
        rounds_played: 0,
        rounds_total: 1,
    }
}

/// Last round of Siege: the fastest team bleeds 1 ticket/s, so with the
/// default 180s buffer the vote window opens at t0 + 20s.
fn arm_and_open(h: &mut Harness) -> DateTime<Utc> {
    process_event(
        &mut h.scheduler,
        EngineEvent::LevelLoaded {
            map: "MP_Siege".to_string(),
            gamemode: "ConquestLarge0".to_string(),
            rounds_played: 0,
            rounds_total: 1,
        },
        t0(),
    );
    assert_eq!(h.scheduler.state(), VoteState::Armed);

    process_event(&mut h.scheduler, EngineEvent::ServerInfo(conquest(100, 1000, 500)), t0());
    process_event(&mut h.scheduler, EngineEvent::Tick, t0() + Duration::seconds(5));
    assert_eq!(h.scheduler.state(), VoteState::Armed);

    let second = t0() + Duration::seconds(20);
    process_event(&mut h.scheduler, EngineEvent::ServerInfo(conquest(120, 990, 480)), second);
    let window = h.scheduler.window().unwrap();
    assert_eq!(window.start, second);
    assert_eq!(window.end, second + Duration::seconds(300 + 180 - 60));

    let opened = second + Duration::seconds(1);
    process_event(&mut h.scheduler, EngineEvent::Tick, opened);
    assert_eq!(h.scheduler.state(), VoteState::Open);
    opened
}

fn vote(h: &mut Harness, voter: &str, option: usize, now: DateTime<Utc>) -> Result<VoteReceipt> {
    let (reply, mut rx) = tokio::sync::oneshot::channel();
    process_event(
        &mut h.scheduler,
        EngineEvent::Vote {
            voter: voter.to_string(),
            option,
            reply: Some(reply),
        },
        now,
    );
    rx.try_recv().unwrap()
}

#[test]
fn test_automatic_vote_applies_winner() {
    let config = VotemapConfig {
        dispatch_targets: vec!["MapRotator@OnNextMap".to_string(), "broken".to_string()],
        ..VotemapConfig::default()
    };
    let mut h = harness(config);
    let opened = arm_and_open(&mut h);

    let session = h.scheduler.session().unwrap().clone();
    assert_eq!(session.options().len(), 4);
    assert!(session.options().iter().all(|e| e.file_name != "MP_Siege"));
    assert!(h.sink.sent().contains(&Sent::Schedule(
        TaskAction::ShowOptions.task_id().to_string(),
        6,
        60
    )));

    assert_eq!(vote(&mut h, "Alice", 2, opened).unwrap(), VoteReceipt::Recorded { option: 1 });
    assert_eq!(vote(&mut h, "Bob", 1, opened).unwrap(), VoteReceipt::Recorded { option: 0 });
    assert_eq!(
        vote(&mut h, "Bob", 2, opened).unwrap(),
        VoteReceipt::Changed { from: 0, to: 1 }
    );
    assert_eq!(vote(&mut h, "Bob", 2, opened).unwrap(), VoteReceipt::Unchanged { option: 1 });
    assert_eq!(vote(&mut h, "Carol", 3, opened).unwrap(), VoteReceipt::Recorded { option: 2 });
    assert!(matches!(
        vote(&mut h, "Dave", 7, opened),
        Err(VotemapError::InvalidBallot { option: 7, max: 4 })
    ));
    assert_eq!(
        h.sink.said_to("Dave"),
        vec!["Dave: Your vote was not recognised. Please try again.".to_string()]
    );
    assert!(h.sink.said_to("Bob")[1].starts_with("Bob: You changed your vote from "));

    // Still inside the voting duration.
    process_event(&mut h.scheduler, EngineEvent::Tick, opened + Duration::seconds(300));
    assert_eq!(h.scheduler.state(), VoteState::Open);

    process_event(&mut h.scheduler, EngineEvent::Tick, opened + Duration::seconds(301));
    assert_eq!(h.scheduler.state(), VoteState::Closed);

    let result = h.scheduler.last_result().unwrap();
    assert_eq!(result.outcome, TallyOutcome::Winner { option: 1, tied: vec![] });
    assert_eq!(result.total_weighted, 3);

    let winner = &session.options()[1];
    let said = h.sink.said_to_all();
    assert!(said.contains(&"VOTING ENDED!".to_string()));
    assert!(said.iter().any(|line| line.contains("Won with 67% of the votes (2/3)")));

    let sent = h.sink.sent();
    assert!(sent.contains(&Sent::NextMap(winner.list_index)));
    assert!(sent.contains(&Sent::Cancel(TaskAction::ShowOptions.task_id().to_string())));
    assert!(sent.contains(&Sent::Schedule(
        TaskAction::ShowNextMap.task_id().to_string(),
        90,
        600
    )));
    assert!(sent.contains(&Sent::Plugin(
        "MapRotator".to_string(),
        "OnNextMap".to_string(),
        vec![winner.file_name.clone(), "ConquestLarge0".to_string()]
    )));
    assert_eq!(
        sent.iter().filter(|s| matches!(s, Sent::Plugin(..))).count(),
        1
    );

    // Ballots after the close are refused.
    assert_eq!(
        vote(&mut h, "Erin", 1, opened + Duration::seconds(302)),
        Err(VotemapError::VoteNotOpen)
    );
    assert!(h.sink.said_to("Erin")[0].starts_with("Erin: Voting has ended, the next map will be "));
}

#[test]
fn test_no_quorum_falls_back_to_first_map() {
    let config = VotemapConfig {
        vote_threshold: 10,
        ..VotemapConfig::default()
    };
    let mut h = harness(config);
    let opened = arm_and_open(&mut h);

    for (voter, option) in [("A", 1), ("B", 1), ("C", 2), ("D", 3)] {
        vote(&mut h, voter, option, opened).unwrap();
    }

    process_event(&mut h.scheduler, EngineEvent::RoundOver, opened + Duration::seconds(60));
    assert_eq!(h.scheduler.state(), VoteState::Closed);
    assert_eq!(h.scheduler.last_result().unwrap().outcome, TallyOutcome::NoQuorum);

    let said = h.sink.said_to_all();
    assert!(said.contains(
        &"Votemap failed. The total number votes (4) did not exceed the threshold (10)".to_string()
    ));
    assert!(h.sink.sent().contains(&Sent::NextMap(0)));
    assert_eq!(said.last().unwrap(), "Next Map: Siege of Shanghai [CQ]");
}

#[test]
fn test_vip_and_server_weighting() {
    let config = VotemapConfig {
        vips: vec!["ConfiguredVip".to_string()],
        ..VotemapConfig::default()
    };
    let mut h = harness(config);
    h.directory.sync_reserved_slots(vec!["SlotVip".to_string()]);
    let opened = arm_and_open(&mut h);

    for (voter, option) in [
        ("A", 1),
        ("B", 1),
        ("C", 1),
        ("D", 1),
        ("ConfiguredVip", 2),
        ("SlotVip", 3),
        (SERVER_VOTER, 4),
    ] {
        vote(&mut h, voter, option, opened).unwrap();
    }

    let lines = h.scheduler.status(opened).options;
    assert!(lines[0].starts_with("Type: /1, /2"));

    process_event(&mut h.scheduler, EngineEvent::RunNextLevel, opened + Duration::seconds(30));
    let result = h.scheduler.last_result().unwrap();
    let weighted: Vec<u32> = result.counts.iter().map(|c| c.weighted).collect();
    assert_eq!(weighted, vec![4, 3, 3, 5]);
    assert_eq!(result.winner(), Some(3));
    assert_eq!(result.distinct_voters, 7);
}

#[test]
fn test_server_weighting_can_match_vip() {
    let config = VotemapConfig {
        server_weighting: ServerWeighting::AsVip,
        ..VotemapConfig::default()
    };
    let mut h = harness(config);
    let opened = arm_and_open(&mut h);
    vote(&mut h, SERVER_VOTER, 1, opened).unwrap();

    process_event(&mut h.scheduler, EngineEvent::RoundOver, opened + Duration::seconds(10));
    assert_eq!(h.scheduler.last_result().unwrap().total_weighted, 3);
}

#[test]
fn test_restart_discards_ballots() {
    let mut h = harness(VotemapConfig::default());
    let opened = arm_and_open(&mut h);
    vote(&mut h, "Alice", 1, opened).unwrap();

    process_event(&mut h.scheduler, EngineEvent::RestartLevel, opened + Duration::seconds(5));
    assert_eq!(h.scheduler.state(), VoteState::Disabled);
    assert!(h.scheduler.last_result().is_none());
    assert!(!h.sink.said_to_all().contains(&"VOTING ENDED!".to_string()));
    assert!(!h.sink.sent().iter().any(|s| matches!(s, Sent::NextMap(_))));
}

#[test]
fn test_vote_before_window_reports_countdown() {
    let mut h = harness(VotemapConfig::default());
    process_event(
        &mut h.scheduler,
        EngineEvent::LevelLoaded {
            map: "MP_Siege".to_string(),
            gamemode: "RushLarge0".to_string(),
            rounds_played: 0,
            rounds_total: 1,
        },
        t0(),
    );
    assert_eq!(vote(&mut h, "Alice", 1, t0()), Err(VotemapError::VoteNotOpen));
    assert_eq!(
        h.sink.said_to("Alice"),
        vec!["Alice: There is no vote currently in progress.".to_string()]
    );

    // Rush opens 600s into the round; 100s have been played.
    let rush = ServerSnapshot {
        gamemode: "RushLarge0".to_string(),
        team_scores: vec![],
        ..conquest(100, 0, 0)
    };
    process_event(&mut h.scheduler, EngineEvent::ServerInfo(rush), t0());
    let asked = t0() + Duration::seconds(230);
    assert_eq!(vote(&mut h, "Bob", 2, asked), Err(VotemapError::VoteNotOpen));
    assert_eq!(
        h.sink.said_to("Bob"),
        vec![
            "Bob: There is no vote currently in progress. \
             Voting will start in about 4 minutes, 30 seconds"
                .to_string()
        ]
    );
}

#[test]
fn test_banner_every_display() {
    let config = VotemapConfig {
        banner: trusty_votemap::config::BannerMode::All,
        ..VotemapConfig::default()
    };
    let mut h = harness(config);
    let opened = arm_and_open(&mut h);
    assert!(h.sink.sent().contains(&Sent::Schedule(
        TaskAction::ShowBanner.task_id().to_string(),
        0,
        60
    )));

    process_event(&mut h.scheduler, EngineEvent::RunTask(TaskAction::ShowBanner), opened);
    assert!(h.sink.sent().contains(&Sent::Yell("Vote Next Map Now!".to_string())));
    assert!(
        h.sink
            .said_to_all()
            .iter()
            .any(|line| line.contains("VOTE NEXT MAP"))
    );
}

#[tokio::test]
async fn test_engine_loop_serves_handle_requests() {
    let sink = Arc::new(RecordingSink::default());
    let hosts = Collaborators {
        sink: sink.clone(),
        catalog: Arc::new(InMemoryCatalog::with_maps(map_list())),
        directory: Arc::new(InMemoryDirectory::default()),
    };
    let scheduler = Scheduler::with_rng(VotemapConfig::default(), hosts, StdRng::seed_from_u64(7));
    let (handle, events) = EngineHandle::channel();
    let engine = tokio::spawn(run_engine(scheduler, events));

    handle
        .send(EngineEvent::LevelLoaded {
            map: "MP_Naval".to_string(),
            gamemode: "ConquestLarge0".to_string(),
            rounds_played: 1,
            rounds_total: 2,
        })
        .unwrap();
    assert_eq!(handle.status().await.unwrap().state, VoteState::Armed);

    handle.start_voting_poll().await.unwrap();
    assert!(matches!(
        handle.start_voting_poll().await,
        Err(VotemapError::InvalidTransition { .. })
    ));

    assert!(matches!(
        handle.record_vote("Alice", 9).await,
        Err(VotemapError::InvalidBallot { option: 9, max: 4 })
    ));
    assert_eq!(
        handle.record_vote("Alice", 4).await.unwrap(),
        VoteReceipt::Recorded { option: 3 }
    );

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, VoteState::Open);
    assert_eq!(status.options.len(), 3);

    handle.shutdown().unwrap();
    let scheduler = engine.await.unwrap();
    assert_eq!(scheduler.session().unwrap().distinct_voters(), 1);
    assert!(handle.status().await.is_err());
}
