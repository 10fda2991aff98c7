//! Task lifecycle events over a tokio broadcast channel.
//!
//! Slow subscribers miss events rather than blocking the scheduler.

use crate::tasks::action::Action;
use crate::tasks::scheduler::TaskId;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    Scheduled,
    /// Condition held and the action was dispatched.
    Fired,
    /// One-shot task removed itself after firing.
    Completed,
    /// Removed by an explicit cancel.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub id: TaskId,
    pub name: String,
    pub action: Action,
    pub kind: TaskEventKind,
    pub at: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(id: TaskId, name: impl Into<String>, action: Action, kind: TaskEventKind) -> Self {
        Self {
            id,
            name: name.into(),
            action,
            kind,
            at: Utc::now(),
        }
    }
}

/// Broadcasts [`TaskEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct TaskEventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl TaskEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> TaskEventSubscriber {
        TaskEventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Fire and forget; dropped when nobody listens.
    pub fn emit(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TaskEventSubscriber {
    receiver: broadcast::Receiver<TaskEvent>,
}

impl TaskEventSubscriber {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Task event subscriber lagged by {} events", n);
                    continue;
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<TaskEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = TaskEventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(TaskEvent::new(TaskId(7), "sample", Action::StartSampler, TaskEventKind::Fired));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.id, TaskId(7));
        assert_eq!(event.kind, TaskEventKind::Fired);
    }

    #[test]
    fn test_no_subscribers_no_panic() {
        let bus = TaskEventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(TaskEvent::new(TaskId(1), "x", Action::DoNothing, TaskEventKind::Scheduled));
    }

    #[test]
    fn test_lagging_subscriber_skips() {
        let bus = TaskEventBus::with_capacity(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.emit(TaskEvent::new(TaskId(i), "x", Action::DoNothing, TaskEventKind::Fired));
        }
        // try_recv reports the lag as an error once, then resumes with the newest events
        assert!(sub.try_recv().is_none());
        let rest = sub.drain();
        assert_eq!(rest.iter().map(|e| e.id).collect::<Vec<_>>(), vec![TaskId(3), TaskId(4)]);
    }
}
