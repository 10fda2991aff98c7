//! Autonomous tasks: definitions, documents and the scheduler that runs them.

mod action;
mod definition;
mod document;
mod events;
mod scheduler;

pub use action::{Action, ActionDispatcher};
pub use definition::{TaskDefinition, DEFAULT_INTERVAL_MS};
pub use document::{DocumentFormat, TaskDocument};
pub use events::{TaskEvent, TaskEventBus, TaskEventKind, TaskEventSubscriber};
pub use scheduler::{LoadReport, TaskId, TaskScheduler};
