//! The closed set of autonomous actions.

use crate::error::TillerResult;
use async_trait::async_trait;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// An action a task can dispatch.
///
/// Identifiers are validated when a task is defined, never at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Example,
    ReturnHome,
    StartSampler,
    SamplerStop,
    SamplerReset,
    StartSamplerTest,
    StartPump,
    StopPump,
    #[default]
    DoNothing,
}

/// Performs actions on behalf of fired tasks.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Perform `action` for the task named `task`.
    async fn dispatch(&self, action: Action, task: &str) -> TillerResult<()>;
}
