use crate::error::{Result, VotemapError};
use crate::handlers::announce;
use crate::handlers::{Scheduler, VoteState};
use crate::models::BroadcastScope;
use chrono::{DateTime, Utc};
use log::info;

/// What a ballot did, used to pick the confirmation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteReceipt {
    Recorded { option: usize },
    Changed { from: usize, to: usize },
    /// Same option as the voter's existing ballot.
    Unchanged { option: usize },
}

impl Scheduler {
    fn option_label_at(&self, index: usize) -> String {
        self.session
            .as_ref()
            .and_then(|s| s.option(index))
            .map(|entry| self.label(entry))
            .unwrap_or_default()
    }

    /// Record `voter`'s ballot for the 1-based `option_number` and confirm
    /// it to them. Rejected ballots leave the session untouched.
    pub fn record_vote(
        &mut self,
        voter: &str,
        option_number: usize,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt> {
        let player = BroadcastScope::Player(voter.to_string());

        let recorded = match (self.state, self.session.as_mut()) {
            (VoteState::Open, Some(session)) => session.record_vote(voter, option_number),
            _ => Err(VotemapError::VoteNotOpen),
        };

        let previous = match recorded {
            Ok(previous) => previous,
            Err(VotemapError::VoteNotOpen) => {
                let text = match self.state {
                    VoteState::Armed => {
                        announce::no_vote_in_progress(voter, self.seconds_until_vote(now))
                    }
                    _ => announce::voting_has_ended(voter, self.next_map()),
                };
                self.say(&text, &player);
                return Err(VotemapError::VoteNotOpen);
            }
            Err(e) => {
                info!("{} sent an unrecognised vote: {}", voter, e);
                self.say(&announce::vote_not_recognised(voter), &player);
                return Err(e);
            }
        };

        let chosen = option_number - 1;
        let label = self.option_label_at(chosen);
        let receipt = match previous {
            None => VoteReceipt::Recorded { option: chosen },
            Some(from) if from == chosen => VoteReceipt::Unchanged { option: chosen },
            Some(from) => VoteReceipt::Changed { from, to: chosen },
        };

        match receipt {
            VoteReceipt::Recorded { .. } => {
                match &self.config.public_confirmation {
                    Some(template) => self.say(
                        &announce::public_confirmation(template, voter, &label),
                        &BroadcastScope::All,
                    ),
                    None => self.say(&announce::voted_for(voter, &label), &player),
                }
                info!("{} voted for {}", voter, label);
            }
            VoteReceipt::Changed { from, .. } => {
                let from_label = self.option_label_at(from);
                self.say(&announce::changed_vote(voter, &from_label, &label), &player);
                info!("{} changed their vote from {} to {}", voter, from_label, label);
            }
            VoteReceipt::Unchanged { .. } => {
                self.say(&announce::already_voted(voter, &label), &player);
            }
        }

        Ok(receipt)
    }
}
