//! Chat and yell text shown to players.

use crate::host::MapCatalog;
use crate::models::MapEntry;
use crate::models::gamemode::shorthand;

pub const VOTING_ENDED: &str = "VOTING ENDED!";

/// "Siege of Shanghai [CQ]", or just the name when modes are hidden.
pub fn option_label(catalog: &dyn MapCatalog, entry: &MapEntry, show_gamemode: bool) -> String {
    let name = catalog.display_name(&entry.file_name);
    let mode = shorthand(&entry.gamemode);
    if show_gamemode && !mode.is_empty() {
        format!("{} {}", name, mode)
    } else {
        name
    }
}

/// Header line followed by two options per line.
pub fn options_display(prefix: &str, labels: &[String], counts: Option<&[u32]>) -> Vec<String> {
    let mut lines = vec![format!(
        "Type: {p}1, {p}2, ... in chat to vote for the next map!",
        p = prefix
    )];

    let cell = |i: usize| match counts.and_then(|c| c.get(i)) {
        Some(count) => format!("{}{} {} [{}]", prefix, i + 1, labels[i], count),
        None => format!("{}{} {}", prefix, i + 1, labels[i]),
    };

    for (row, pair) in labels.chunks(2).enumerate() {
        let left = row * 2;
        if pair.len() == 2 {
            lines.push(format!(" {} | {}", cell(left), cell(left + 1)));
        } else {
            lines.push(format!(" {}", cell(left)));
        }
    }
    lines
}

pub fn voted_for(voter: &str, label: &str) -> String {
    format!("{}: You voted for {}", voter, label)
}

pub fn changed_vote(voter: &str, from: &str, to: &str) -> String {
    format!("{}: You changed your vote from {} to {}", voter, from, to)
}

pub fn already_voted(voter: &str, label: &str) -> String {
    format!("{}: You have already voted for {}", voter, label)
}

/// Fill `%pn%` with the voter and `%map%` with the chosen map.
pub fn public_confirmation(template: &str, voter: &str, label: &str) -> String {
    template.replace("%pn%", voter).replace("%map%", label)
}

pub fn vote_not_recognised(voter: &str) -> String {
    format!("{}: Your vote was not recognised. Please try again.", voter)
}

pub fn no_vote_in_progress(voter: &str, seconds_until_start: Option<i64>) -> String {
    match seconds_until_start {
        Some(secs) if secs > 0 => format!(
            "{}: There is no vote currently in progress. Voting will start in about {}",
            voter,
            readable_duration(secs)
        ),
        _ => format!("{}: There is no vote currently in progress.", voter),
    }
}

pub fn voting_has_ended(voter: &str, next_map: Option<&str>) -> String {
    match next_map {
        Some(label) => format!("{}: Voting has ended, the next map will be {}", voter, label),
        None => format!("{}: Voting has ended.", voter),
    }
}

pub fn winner_line(label: &str, percent: f64, winner_votes: u32, total: u32) -> String {
    format!(
        "{} Won with {:.0}% of the votes ({}/{})",
        label, percent, winner_votes, total
    )
}

pub fn vote_failed(total: u32, threshold: u32) -> String {
    format!(
        "Votemap failed. The total number votes ({}) did not exceed the threshold ({})",
        total, threshold
    )
}

pub fn next_map(label: &str) -> String {
    format!("Next Map: {}", label)
}

/// "4 minutes, 30 seconds"; whole units only.
pub fn readable_duration(total_secs: i64) -> String {
    let total = total_secs.max(0);
    let parts = [
        (total / 86_400, "days"),
        (total % 86_400 / 3_600, "hours"),
        (total % 3_600 / 60, "minutes"),
        (total % 60, "seconds"),
    ];
    parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{} {}", n, unit))
        .collect::<Vec<_>>()
        .join(", ")
}
