//! State-change logging.

use crate::state::value::StateValue;
use std::sync::Mutex;
use tracing::info;

/// When a write to an entry is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogPolicy {
    #[default]
    Never,
    EverySet,
    /// Only when the stored value differs from the previous one.
    OnChange,
}

/// Sink for state-change records.
pub trait StateLog: Send + Sync {
    fn record(&self, name: &str, index: usize, value: &StateValue);
}

/// Emits state changes as `tracing` events on the `tiller::state` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStateLog;

impl StateLog for TracingStateLog {
    fn record(&self, name: &str, index: usize, value: &StateValue) {
        info!(target: "tiller::state", state = name, index, value = %value, "State changed");
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryStateLog {
    records: Mutex<Vec<(String, usize, StateValue)>>,
}

impl MemoryStateLog {
    pub fn records(&self) -> Vec<(String, usize, StateValue)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of records for one entry.
    pub fn count(&self, name: &str) -> usize {
        self.records
            .lock()
            .map(|r| r.iter().filter(|(n, _, _)| n == name).count())
            .unwrap_or(0)
    }
}

impl StateLog for MemoryStateLog {
    fn record(&self, name: &str, index: usize, value: &StateValue) {
        if let Ok(mut records) = self.records.lock() {
            records.push((name.to_string(), index, *value));
        }
    }
}
