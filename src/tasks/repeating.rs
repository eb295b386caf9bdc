use crate::commands::{EngineEvent, EngineHandle};
use crate::host::TaskAction;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Repeating display tasks keyed by id. Each task posts its action back into
/// the engine queue, so the engine stays the only owner of vote state.
pub struct TaskRegistry {
    engine: EngineHandle,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskRegistry {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) `task_id`. Must be called inside a tokio runtime.
    pub fn schedule(&self, task_id: &str, delay_secs: u64, interval_secs: u64, action: TaskAction) {
        let engine = self.engine.clone();
        let id = task_id.to_string();
        let handle = tokio::spawn(async move {
            let start = Instant::now() + StdDuration::from_secs(delay_secs);
            let mut ticker = interval_at(start, StdDuration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if engine.send(EngineEvent::RunTask(action)).is_err() {
                    debug!("Engine gone, stopping task {}", id);
                    break;
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = tasks.insert(task_id.to_string(), handle) {
            previous.abort();
        }
        info!("Scheduled task {} (delay {}s, every {}s)", task_id, delay_secs, interval_secs);
    }

    /// Returns whether a task was actually running.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.remove(task_id) {
            Some(handle) => {
                handle.abort();
                debug!("Cancelled task {}", task_id);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(task_id)
    }

    pub fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_task_posts_action_until_cancelled() {
        let (handle, mut events) = EngineHandle::channel();
        let registry = TaskRegistry::new(handle);

        registry.schedule("options", 6, 60, TaskAction::ShowOptions);
        assert!(registry.is_scheduled("options"));

        tokio::time::sleep(StdDuration::from_secs(7)).await;
        assert!(matches!(
            events.recv().await,
            Some(EngineEvent::RunTask(TaskAction::ShowOptions))
        ));

        assert!(registry.cancel("options"));
        assert!(!registry.cancel("options"));
        assert!(!registry.is_scheduled("options"));
    }
}
