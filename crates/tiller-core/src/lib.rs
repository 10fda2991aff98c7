//! tiller-core - Core library for tiller.
//!
//! This crate provides the vehicle state store, the trigger language and
//! its condition trees, and the scheduler that turns task definitions into
//! independently polled tasks.
//!
//! # Example
//!
//! ```ignore
//! use tiller_core::{StateStore, TaskScheduler, TaskDocument};
//!
//! let state = Arc::new(StateStore::vehicle(4));
//! let scheduler = TaskScheduler::new(state.clone(), dispatcher);
//!
//! let report = scheduler.load_file("default_behaviors.json").await?;
//! state.set("EC", 1200.0)?;
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod predicates;
pub mod state;
pub mod tasks;
pub mod trigger;

// Re-export commonly used types
pub use config::{CrumbConfig, EngineConfig};
pub use error::{ErrorCode, TillerError, TillerResult};
pub use geo::UtmPose;
pub use predicates::{Combinator, CompareOp, Composer, Condition};
pub use state::{LogPolicy, StateLog, StateSource, StateStore, StateValue, ValueKind};
pub use tasks::{
    Action, ActionDispatcher, LoadReport, TaskDefinition, TaskDocument, TaskEvent, TaskEventBus,
    TaskEventKind, TaskId, TaskScheduler,
};
pub use trigger::{parse_trigger, TriggerParser};
