//! Error types for the crumb graph and planner.

use crate::graph::CrumbId;
use thiserror::Error;
use tiller_core::TillerError;

/// Result type alias for crumb operations.
pub type CrumbResult<T> = Result<T, CrumbError>;

/// Failures surfaced by the crumb graph.
///
/// Sparse or isolated crumbs are not errors; they are logged when they
/// are inserted and the graph keeps growing.
#[derive(Error, Debug)]
pub enum CrumbError {
    /// No path exists to the goal or to any crumb closer to it than the start.
    #[error("No reachable goal candidate from {start} toward {goal}")]
    Unreachable { start: CrumbId, goal: CrumbId },

    /// A path operation was given no crumbs.
    #[error("Path is empty")]
    EmptyPath,

    /// Id does not belong to this graph.
    #[error("Unknown crumb: {0}")]
    UnknownCrumb(CrumbId),

    /// Pose has no GPS fix and cannot be placed in the graph.
    #[error("Pose has no fix: {0}")]
    NoFix(String),

    /// A thread panicked while holding a graph lock.
    #[error("Crumb graph lock poisoned: {0}")]
    LockPoisoned(String),
}

impl CrumbError {
    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        Self::LockPoisoned(message.into())
    }

    /// Check if the planner gave up rather than the graph failing.
    pub fn is_planning_failure(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for CrumbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned(err.to_string())
    }
}

impl From<CrumbError> for TillerError {
    fn from(err: CrumbError) -> Self {
        TillerError::internal(format!("crumbs: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_failure() {
        let err = CrumbError::Unreachable {
            start: CrumbId(0),
            goal: CrumbId(3),
        };
        assert!(err.is_planning_failure());
        assert_eq!(
            err.to_string(),
            "No reachable goal candidate from crumb-0 toward crumb-3"
        );
        assert!(!CrumbError::EmptyPath.is_planning_failure());
    }
}
