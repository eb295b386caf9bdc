use crate::voting::{TallyOutcome, TallyResult, TallyRules, VoteCount, VoteSession};
use log::{debug, info};
use rand::Rng;
use rand::seq::SliceRandom;

/// Ballot and weighted totals per option, in option order.
pub fn count_votes<F>(session: &VoteSession, rules: &TallyRules, is_vip: F) -> Vec<VoteCount>
where
    F: Fn(&str) -> bool,
{
    let mut counts: Vec<VoteCount> = (0..session.options().len())
        .map(|option| VoteCount {
            option,
            ballots: 0,
            weighted: 0,
        })
        .collect();

    for (voter, &option) in session.ballots() {
        if let Some(count) = counts.get_mut(option) {
            count.ballots += 1;
            count.weighted += rules.weight_of(voter, is_vip(voter));
        }
    }
    counts
}

/// Weighted plurality: most weighted votes wins, ties broken uniformly at
/// random, and the result only stands if the total reaches the threshold.
pub fn tally<F, R>(
    session: &VoteSession,
    rules: &TallyRules,
    is_vip: F,
    player_count: usize,
    rng: &mut R,
) -> TallyResult
where
    F: Fn(&str) -> bool,
    R: Rng + ?Sized,
{
    let counts = count_votes(session, rules, is_vip);
    let total_weighted: u32 = counts.iter().map(|c| c.weighted).sum();
    let distinct_voters = session.distinct_voters();
    let turnout = if player_count == 0 {
        0.0
    } else {
        distinct_voters as f64 / player_count as f64
    };

    let outcome = if total_weighted == 0 || total_weighted < rules.threshold {
        info!(
            "Vote {} failed: {} weighted vote(s), threshold {}",
            session.id, total_weighted, rules.threshold
        );
        TallyOutcome::NoQuorum
    } else {
        let top = counts.iter().map(|c| c.weighted).max().unwrap_or(0);
        let leaders: Vec<usize> = counts
            .iter()
            .filter(|c| c.weighted == top)
            .map(|c| c.option)
            .collect();
        let option = leaders.choose(rng).copied().unwrap_or(0);
        if leaders.len() > 1 {
            info!(
                "Vote tie between options {:?} with {} votes each, option {} drawn",
                leaders.iter().map(|i| i + 1).collect::<Vec<_>>(),
                top,
                option + 1
            );
            TallyOutcome::Winner { option, tied: leaders }
        } else {
            TallyOutcome::Winner { option, tied: Vec::new() }
        }
    };

    debug!(
        "Tally for vote {}: {:?}, turnout {:.0}% ({} of {} players)",
        session.id,
        counts.iter().map(|c| c.weighted).collect::<Vec<_>>(),
        turnout * 100.0,
        distinct_voters,
        player_count
    );

    TallyResult {
        outcome,
        counts,
        total_weighted,
        distinct_voters,
        turnout,
    }
}
