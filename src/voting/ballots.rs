use crate::error::{Result, VotemapError};
use crate::models::MapEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// One open ballot. The options never change once the session exists.
#[derive(Debug, Clone)]
pub struct VoteSession {
    pub id: Uuid,
    options: Vec<MapEntry>,
    ballots: HashMap<String, usize>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl VoteSession {
    pub fn new(options: Vec<MapEntry>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            options,
            ballots: HashMap::new(),
            start_time,
            end_time,
        }
    }

    pub fn options(&self) -> &[MapEntry] {
        &self.options
    }

    pub fn option(&self, index: usize) -> Option<&MapEntry> {
        self.options.get(index)
    }

    pub fn ballots(&self) -> &HashMap<String, usize> {
        &self.ballots
    }

    pub fn choice_of(&self, voter: &str) -> Option<usize> {
        self.ballots.get(voter).copied()
    }

    pub fn distinct_voters(&self) -> usize {
        self.ballots.len()
    }

    /// Store `voter`'s choice of the 1-based `option_number`, replacing any
    /// earlier ballot. Returns the previous zero-based choice.
    pub fn record_vote(&mut self, voter: &str, option_number: usize) -> Result<Option<usize>> {
        if option_number == 0 || option_number > self.options.len() {
            return Err(VotemapError::InvalidBallot {
                option: option_number,
                max: self.options.len(),
            });
        }
        Ok(self.ballots.insert(voter.to_string(), option_number - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> VoteSession {
        let now = Utc::now();
        VoteSession::new(
            vec![
                MapEntry::new("MP_Siege", "ConquestLarge0", 0, 1),
                MapEntry::new("MP_Naval", "ConquestLarge0", 1, 1),
                MapEntry::new("MP_Tremors", "RushLarge0", 2, 1),
            ],
            now,
            now + Duration::seconds(300),
        )
    }

    #[test]
    fn test_second_ballot_replaces_first() {
        let mut session = session();
        assert_eq!(session.record_vote("Alice", 1).unwrap(), None);
        assert_eq!(session.record_vote("Alice", 3).unwrap(), Some(0));
        assert_eq!(session.distinct_voters(), 1);
        assert_eq!(session.choice_of("Alice"), Some(2));
    }

    #[test]
    fn test_out_of_range_ballot_is_rejected() {
        let mut session = session();
        session.record_vote("Bob", 2).unwrap();

        assert_eq!(
            session.record_vote("Bob", 0),
            Err(VotemapError::InvalidBallot { option: 0, max: 3 })
        );
        assert_eq!(
            session.record_vote("Bob", 4),
            Err(VotemapError::InvalidBallot { option: 4, max: 3 })
        );
        assert_eq!(session.choice_of("Bob"), Some(1));
        assert_eq!(session.distinct_voters(), 1);
    }
}
