//! Error types for tiller operations.
//!
//! Every failure carries a structured [`ErrorCode`] so callers can tell a
//! definition problem (drop the task, keep loading) from an evaluation problem
//! (treat the condition as false for this tick) without string matching.

use thiserror::Error;

/// Result type alias for tiller operations.
pub type TillerResult<T> = Result<T, TillerError>;

/// Main error type for all tiller-core operations.
#[derive(Error, Debug)]
pub enum TillerError {
    /// State name is not part of the namespace.
    #[error("State not found: {name}")]
    NotFound { name: String, code: ErrorCode },

    /// Slot index past the end of a fixed-size entry.
    #[error("State index out of range: {name}[{index}] (size {size})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        size: usize,
        code: ErrorCode,
    },

    /// Entry exists but holds no value yet (e.g. a pose before the first fix).
    #[error("State has no value: {name}[{index}]")]
    Unset {
        name: String,
        index: usize,
        code: ErrorCode,
    },

    /// Value kind does not fit the entry or the operation.
    #[error("State kind mismatch for {name}: expected {expected}, found {found}")]
    KindMismatch {
        name: String,
        expected: String,
        found: String,
        code: ErrorCode,
    },

    /// Entry is computed on read and cannot be written.
    #[error("State is read-only: {name}")]
    ReadOnly { name: String, code: ErrorCode },

    /// Trigger text could not be compiled.
    #[error("Trigger syntax error at {position}: {message}")]
    Syntax {
        message: String,
        position: usize,
        code: ErrorCode,
    },

    /// Task definition rejected at load time.
    #[error("Task definition error in '{task}': {message}")]
    Definition {
        task: String,
        message: String,
        code: ErrorCode,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // State (STATE_xxx)
    StateNotFound,
    StateIndexOutOfRange,
    StateUnset,
    StateKindMismatch,
    StateReadOnly,

    // Trigger (TRG_xxx)
    TrgUnexpectedToken,
    TrgUnbalanced,
    TrgInvalidNumber,
    TrgUnknownState,
    TrgEmpty,

    // Definition (DEF_xxx)
    DefUnknownAction,
    DefInvalidInterval,
    DefInvalidEnds,
    DefInvalidTrigger,
    DefMissingTrigger,
    DefMalformed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StateNotFound => "STATE_001",
            ErrorCode::StateIndexOutOfRange => "STATE_002",
            ErrorCode::StateUnset => "STATE_003",
            ErrorCode::StateKindMismatch => "STATE_004",
            ErrorCode::StateReadOnly => "STATE_005",
            ErrorCode::TrgUnexpectedToken => "TRG_001",
            ErrorCode::TrgUnbalanced => "TRG_002",
            ErrorCode::TrgInvalidNumber => "TRG_003",
            ErrorCode::TrgUnknownState => "TRG_004",
            ErrorCode::TrgEmpty => "TRG_005",
            ErrorCode::DefUnknownAction => "DEF_001",
            ErrorCode::DefInvalidInterval => "DEF_002",
            ErrorCode::DefInvalidEnds => "DEF_003",
            ErrorCode::DefInvalidTrigger => "DEF_004",
            ErrorCode::DefMissingTrigger => "DEF_005",
            ErrorCode::DefMalformed => "DEF_006",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl TillerError {
    /// Create a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            code: ErrorCode::StateNotFound,
        }
    }

    /// Create an index out of range error.
    pub fn index_out_of_range(name: impl Into<String>, index: usize, size: usize) -> Self {
        Self::IndexOutOfRange {
            name: name.into(),
            index,
            size,
            code: ErrorCode::StateIndexOutOfRange,
        }
    }

    /// Create an unset value error.
    pub fn unset(name: impl Into<String>, index: usize) -> Self {
        Self::Unset {
            name: name.into(),
            index,
            code: ErrorCode::StateUnset,
        }
    }

    /// Create a kind mismatch error.
    pub fn kind_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::KindMismatch {
            name: name.into(),
            expected: expected.into(),
            found: found.into(),
            code: ErrorCode::StateKindMismatch,
        }
    }

    /// Create a read-only error.
    pub fn read_only(name: impl Into<String>) -> Self {
        Self::ReadOnly {
            name: name.into(),
            code: ErrorCode::StateReadOnly,
        }
    }

    /// Create a trigger syntax error.
    pub fn syntax(code: ErrorCode, message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
            code,
        }
    }

    /// Create a task definition error.
    pub fn definition(code: ErrorCode, task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            task: task.into(),
            message: message.into(),
            code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::IndexOutOfRange { code, .. } => *code,
            Self::Unset { code, .. } => *code,
            Self::KindMismatch { code, .. } => *code,
            Self::ReadOnly { code, .. } => *code,
            Self::Syntax { code, .. } => *code,
            Self::Definition { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this error came from reading the state store.
    ///
    /// Condition evaluation degrades these to `false` instead of failing.
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::IndexOutOfRange { .. }
                | Self::Unset { .. }
                | Self::KindMismatch { .. }
                | Self::ReadOnly { .. }
        )
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Check the state name against the vehicle state namespace"),
            Self::Syntax { .. } => {
                Some("Triggers look like `EC > 1000 & jars_available` or `^(is_going_home)`")
            }
            Self::Definition {
                code: ErrorCode::DefUnknownAction,
                ..
            } => Some("Use one of the known action identifiers, e.g. return_home or start_sampler"),
            Self::Definition {
                code: ErrorCode::DefInvalidEnds,
                ..
            } => Some("The ends field must be one of y, n, yes, no, true, false"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = TillerError::not_found("warp_drive");
        assert_eq!(err.code(), ErrorCode::StateNotFound);
        assert!(err.to_string().contains("warp_drive"));
        assert!(err.suggestion().is_some());
        assert!(err.is_state_error());
    }

    #[test]
    fn test_definition_error() {
        let err = TillerError::definition(ErrorCode::DefUnknownAction, "fly", "unknown action 'levitate'");
        assert_eq!(err.code(), ErrorCode::DefUnknownAction);
        assert!(err.to_string().contains("fly"));
        assert!(!err.is_state_error());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::StateNotFound.as_str(), "STATE_001");
        assert_eq!(ErrorCode::TrgUnbalanced.as_str(), "TRG_002");
        assert_eq!(ErrorCode::DefUnknownAction.as_str(), "DEF_001");
    }
}
