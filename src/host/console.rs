//! Sink that writes game server commands as JSON lines on stdout.

use crate::error::{Result, VotemapError};
use crate::host::{CommandSink, TaskAction};
use crate::models::BroadcastScope;
use crate::tasks::repeating::TaskRegistry;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Debug, Serialize)]
pub struct OutboundCommand<'a> {
    pub command: &'a str,
    pub args: Vec<String>,
}

fn scope_args(scope: &BroadcastScope) -> Vec<String> {
    match scope {
        BroadcastScope::All => vec!["all".to_string()],
        BroadcastScope::Player(name) => vec!["player".to_string(), name.clone()],
    }
}

/// Queues commands for `run_console_writer`; never touches stdout itself, so
/// the engine loop cannot stall on a slow reader.
pub struct ConsoleSink {
    tasks: TaskRegistry,
    lines: mpsc::UnboundedSender<String>,
}

impl ConsoleSink {
    pub fn new(tasks: TaskRegistry, lines: mpsc::UnboundedSender<String>) -> Self {
        Self { tasks, lines }
    }

    fn emit(&self, command: &str, args: Vec<String>) -> Result<()> {
        let line = serde_json::to_string(&OutboundCommand { command, args })
            .map_err(|e| VotemapError::DispatchFailed(e.to_string()))?;
        self.lines
            .send(line)
            .map_err(|_| VotemapError::DispatchFailed("console writer stopped".to_string()))
    }
}

/// Write queued command lines to `out` until every sender is dropped or a
/// write fails.
pub async fn run_console_writer<W>(
    mut lines: mpsc::UnboundedReceiver<String>,
    mut out: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = lines.recv().await {
        line.push('\n');
        let written = match out.write_all(line.as_bytes()).await {
            Ok(()) => out.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let err = VotemapError::DispatchFailed(e.to_string());
            warn!("Console writer stopping: {}", err);
            return Err(err);
        }
    }
    debug!("Console writer finished");
    Ok(())
}

impl CommandSink for ConsoleSink {
    fn broadcast(&self, text: &str, scope: &BroadcastScope) -> Result<()> {
        let mut args = vec![text.to_string()];
        args.extend(scope_args(scope));
        self.emit("admin.say", args)
    }

    fn yell(&self, text: &str, duration_secs: u32, scope: &BroadcastScope) -> Result<()> {
        let mut args = vec![text.to_string(), duration_secs.to_string()];
        args.extend(scope_args(scope));
        self.emit("admin.yell", args)
    }

    fn schedule_repeating(
        &self,
        task_id: &str,
        delay_secs: u64,
        interval_secs: u64,
        action: TaskAction,
    ) -> Result<()> {
        self.tasks.schedule(task_id, delay_secs, interval_secs, action);
        Ok(())
    }

    fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.tasks.cancel(task_id);
        Ok(())
    }

    fn set_next_map(&self, list_index: usize) -> Result<()> {
        info!("Next map index set to: {}", list_index);
        self.emit("mapList.setNextMapIndex", vec![list_index.to_string()])?;
        self.emit("mapList.getMapIndices", Vec::new())
    }

    fn call_plugin(&self, plugin: &str, method: &str, args: &[String]) -> Result<()> {
        let mut all = vec![plugin.to_string(), method.to_string()];
        all.extend_from_slice(args);
        self.emit("procon.protected.plugins.call", all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EngineHandle;

    #[tokio::test]
    async fn test_commands_reach_the_writer_as_json_lines() {
        let (engine, _events) = EngineHandle::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ConsoleSink::new(TaskRegistry::new(engine), tx);

        sink.broadcast("hello", &BroadcastScope::Player("Alice".to_string()))
            .unwrap();
        sink.set_next_map(3).unwrap();
        drop(sink);

        let mut out: Vec<u8> = Vec::new();
        run_console_writer(rx, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"command":"admin.say","args":["hello","player","Alice"]}"#,
                r#"{"command":"mapList.setNextMapIndex","args":["3"]}"#,
                r#"{"command":"mapList.getMapIndices","args":[]}"#,
            ]
        );
    }

    #[tokio::test]
    async fn test_send_after_writer_stops_is_a_dispatch_failure() {
        let (engine, _events) = EngineHandle::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ConsoleSink::new(TaskRegistry::new(engine), tx);
        drop(rx);

        assert!(matches!(
            sink.yell("hi", 5, &BroadcastScope::All),
            Err(VotemapError::DispatchFailed(_))
        ));
    }
}
