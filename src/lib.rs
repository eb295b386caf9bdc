pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod host;
pub mod models;
pub mod selection;
pub mod tasks;
pub mod voting;

pub use commands::{EngineEvent, EngineHandle, run_engine};
pub use config::VotemapConfig;
pub use error::{Result, VotemapError};
pub use handlers::{Collaborators, Scheduler, VoteState};
