//! Error handling for the engine runtime and command feed.

use thiserror::Error;
use tiller_core::TillerError;
use tiller_crumbs::CrumbError;

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] TillerError),

    #[error(transparent)]
    Crumbs(#[from] CrumbError),

    /// A command line that could not be understood.
    #[error("Bad command: {0}")]
    Command(String),

    #[error("Engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }

    /// Stable code for log records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(e) => e.code().as_str(),
            Self::Crumbs(_) => "CRUMB_ERROR",
            Self::Command(_) => "BAD_COMMAND",
            Self::NotRunning => "NOT_RUNNING",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
