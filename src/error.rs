use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VotemapError {
    /// No round-end estimate this tick. Retried on the next sample.
    #[error("round end estimate unavailable: {reason}")]
    EstimationUnavailable { reason: String },

    #[error("not enough maps to build a vote ({available} candidate(s) left after filtering)")]
    InsufficientCandidates { available: usize },

    #[error("option {option} is not on the ballot (valid options are 1-{max})")]
    InvalidBallot { option: usize, max: usize },

    #[error("there is no vote currently in progress")]
    VoteNotOpen,

    #[error("total weighted votes ({total}) did not reach the threshold ({threshold})")]
    NoQuorum { total: u32, threshold: u32 },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    ConfigOutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("command dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("cannot {action} while the vote is {state}")]
    InvalidTransition { action: &'static str, state: String },

    #[error("vote engine is no longer running")]
    EngineClosed,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VotemapError>;
