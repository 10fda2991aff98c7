//! Thread-safe typed vehicle state.
//!
//! Entries are registered once when the store is built and never removed.
//! Each entry is one of a closed set of cells (flag, numeric, pose or
//! derived) and carries its own logging policy.

pub mod cell;
mod log;
pub mod names;
mod store;
mod value;

pub use cell::{Cell, DerivedCell, FlagCell, NumericCell, PoseCell, StateCell, Written};
pub use log::{LogPolicy, MemoryStateLog, StateLog, TracingStateLog};
#[cfg(test)]
pub use store::MockStateSource;
pub use store::{StateSource, StateStore, StateStoreBuilder};
pub use value::{StateValue, ValueKind};
