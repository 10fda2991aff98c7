//! Periodic task scheduler.
//!
//! Every scheduled task runs as its own tokio task polling its condition on
//! a fixed interval. The first poll happens immediately. A one-shot task
//! removes itself from the registry after its first firing; a permanent task
//! stays until cancelled. Cancellation is cooperative: it stops the timer but
//! never interrupts an evaluation or dispatch already in progress.

use crate::error::{TillerError, TillerResult};
use crate::state::StateSource;
use crate::tasks::action::{Action, ActionDispatcher};
use crate::tasks::definition::{TaskDefinition, DEFAULT_INTERVAL_MS};
use crate::tasks::document::TaskDocument;
use crate::tasks::events::{TaskEvent, TaskEventBus, TaskEventKind};
use crate::trigger::TriggerParser;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Identifier of a scheduled task instance. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

struct TaskHandle {
    name: String,
    action: Action,
    token: CancellationToken,
}

type Registry = Arc<RwLock<HashMap<TaskId, TaskHandle>>>;

/// Outcome of loading a task document.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub scheduled: Vec<(TaskId, String)>,
    /// Tasks rejected at definition time, with the reason.
    pub failures: Vec<(String, TillerError)>,
}

impl LoadReport {
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Binds task definitions to live timers.
pub struct TaskScheduler {
    state: Arc<dyn StateSource>,
    dispatcher: Arc<dyn ActionDispatcher>,
    registry: Registry,
    next_id: AtomicU64,
    events: TaskEventBus,
    parser: TriggerParser,
    default_interval: Duration,
}

impl TaskScheduler {
    pub fn new(state: Arc<dyn StateSource>, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            state,
            dispatcher,
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            events: TaskEventBus::new(),
            parser: TriggerParser::new(),
            default_interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }

    /// Parser used when loading documents.
    pub fn with_parser(mut self, parser: TriggerParser) -> Self {
        self.parser = parser;
        self
    }

    /// Interval for document entries that give none.
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub fn events(&self) -> &TaskEventBus {
        &self.events
    }

    pub fn parser(&self) -> &TriggerParser {
        &self.parser
    }

    /// Start polling a task. Must be called within a tokio runtime.
    pub async fn schedule(&self, definition: TaskDefinition) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let token = CancellationToken::new();
        let name = definition.name.clone();
        let action = definition.action;
        debug!(
            task = %name,
            id = %id,
            trigger = %definition.trigger,
            reads = ?definition.condition.referenced_states(),
            every_ms = definition.interval.as_millis() as u64,
            "Scheduling task"
        );

        // Hold the registry lock across spawn so a task firing on its first
        // tick cannot try to remove itself before it is registered.
        let mut registry = self.registry.write().await;
        tokio::spawn(run_task(
            id,
            definition,
            self.state.clone(),
            self.dispatcher.clone(),
            self.registry.clone(),
            self.events.clone(),
            token.clone(),
        ));
        registry.insert(
            id,
            TaskHandle {
                name: name.clone(),
                action,
                token,
            },
        );
        drop(registry);

        self.events
            .emit(TaskEvent::new(id, name.as_str(), action, TaskEventKind::Scheduled));
        id
    }

    /// Compile and schedule every task of a document.
    pub async fn load_document(&self, document: &TaskDocument) -> LoadReport {
        let mut report = LoadReport::default();
        for (name, compiled) in document.compile(&self.parser, self.default_interval) {
            match compiled {
                Ok(definition) => {
                    let id = self.schedule(definition).await;
                    report.scheduled.push((id, name));
                }
                Err(e) => {
                    warn!(task = %name, error = %e, "Skipping task definition");
                    report.failures.push((name, e));
                }
            }
        }
        info!(
            scheduled = report.scheduled.len(),
            skipped = report.failures.len(),
            "Task document loaded"
        );
        report
    }

    /// Read a document file and schedule its tasks.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> TillerResult<LoadReport> {
        let document = TaskDocument::from_file(path)?;
        Ok(self.load_document(&document).await)
    }

    /// Cancel one task. Returns whether it was still registered.
    pub async fn cancel(&self, id: TaskId) -> bool {
        let handle = self.registry.write().await.remove(&id);
        match handle {
            Some(handle) => {
                handle.token.cancel();
                debug!(task = %handle.name, id = %id, "Task cancelled");
                self.events.emit(TaskEvent::new(
                    id,
                    handle.name,
                    handle.action,
                    TaskEventKind::Cancelled,
                ));
                true
            }
            None => false,
        }
    }

    /// Cancel every task and clear the registry. Returns how many were active.
    pub async fn cancel_all(&self) -> usize {
        let drained: Vec<(TaskId, TaskHandle)> = self.registry.write().await.drain().collect();
        let count = drained.len();
        for (id, handle) in drained {
            handle.token.cancel();
            self.events.emit(TaskEvent::new(
                id,
                handle.name,
                handle.action,
                TaskEventKind::Cancelled,
            ));
        }
        if count > 0 {
            info!(count, "All tasks cancelled");
        }
        count
    }

    pub async fn active_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_active(&self, id: TaskId) -> bool {
        self.registry.read().await.contains_key(&id)
    }

    /// Names of active tasks, sorted.
    pub async fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .read()
            .await
            .values()
            .map(|h| h.name.clone())
            .collect();
        names.sort();
        names
    }
}

async fn run_task(
    id: TaskId,
    definition: TaskDefinition,
    state: Arc<dyn StateSource>,
    dispatcher: Arc<dyn ActionDispatcher>,
    registry: Registry,
    events: TaskEventBus,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(definition.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(
        task = %definition.name,
        id = %id,
        trigger = %definition.trigger,
        interval_ms = definition.interval.as_millis() as u64,
        "Task started"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !definition.condition.evaluate(state.as_ref()) {
            continue;
        }

        info!(task = %definition.name, action = %definition.action, "Task fired");
        events.emit(TaskEvent::new(
            id,
            definition.name.as_str(),
            definition.action,
            TaskEventKind::Fired,
        ));
        if let Err(e) = dispatcher.dispatch(definition.action, &definition.name).await {
            error!(task = %definition.name, action = %definition.action, error = %e, "Action failed");
        }

        if definition.ends {
            let removed = registry.write().await.remove(&id).is_some();
            token.cancel();
            if removed {
                events.emit(TaskEvent::new(
                    id,
                    definition.name.as_str(),
                    definition.action,
                    TaskEventKind::Completed,
                ));
            }
            debug!(task = %definition.name, id = %id, "One-shot task completed");
            break;
        }
    }
}
