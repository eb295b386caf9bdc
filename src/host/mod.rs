//! Contracts with the game server and its admin layer.

pub mod console;
pub mod memory;

use crate::error::Result;
use crate::models::{BroadcastScope, MapEntry, PlayerInfo, ServerSnapshot};
use async_trait::async_trait;

/// Periodic work the engine asks the host to repeat until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    ShowOptions,
    ShowBanner,
    ShowNextMap,
}

impl TaskAction {
    pub fn task_id(self) -> &'static str {
        match self {
            TaskAction::ShowOptions => "votemap-display-options",
            TaskAction::ShowBanner => "votemap-display-banner",
            TaskAction::ShowNextMap => "votemap-display-next-map",
        }
    }
}

#[async_trait]
pub trait GameStateSource: Send + Sync {
    async fn snapshot(&self) -> Result<ServerSnapshot>;
}

pub trait PlayerDirectory: Send + Sync {
    fn roster(&self) -> Vec<PlayerInfo>;
    fn is_vip(&self, name: &str) -> bool;
}

/// Outbound commands. Every call is fire-and-forget: `Ok` only means the
/// command was handed off, never that the server applied it.
pub trait CommandSink: Send + Sync {
    fn broadcast(&self, text: &str, scope: &BroadcastScope) -> Result<()>;
    fn yell(&self, text: &str, duration_secs: u32, scope: &BroadcastScope) -> Result<()>;
    fn schedule_repeating(
        &self,
        task_id: &str,
        delay_secs: u64,
        interval_secs: u64,
        action: TaskAction,
    ) -> Result<()>;
    /// Cancelling an unknown or already cancelled task is not an error.
    fn cancel_task(&self, task_id: &str) -> Result<()>;
    fn set_next_map(&self, list_index: usize) -> Result<()>;
    /// Invoke `method` on another plugin with the given arguments.
    fn call_plugin(&self, plugin: &str, method: &str, args: &[String]) -> Result<()>;
}

pub trait MapCatalog: Send + Sync {
    fn current_list(&self) -> Vec<MapEntry>;
    fn display_name(&self, file_name: &str) -> String;
}
