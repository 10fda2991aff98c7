//! Validated task definitions.

use crate::error::{ErrorCode, TillerError, TillerResult};
use crate::predicates::Condition;
use crate::tasks::action::Action;
use crate::trigger::TriggerParser;
use serde::Deserialize;
use std::time::Duration;

/// Default polling interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// A task ready to be scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub name: String,
    pub action: Action,
    /// Source text of the trigger, kept for logging.
    pub trigger: String,
    pub condition: Condition,
    pub interval: Duration,
    /// One-shot: stop after the first firing.
    pub ends: bool,
}

impl TaskDefinition {
    /// Build a definition from already-validated parts.
    pub fn new(
        name: impl Into<String>,
        action: Action,
        trigger: impl Into<String>,
        condition: Condition,
        interval: Duration,
        ends: bool,
    ) -> Self {
        Self {
            name: name.into(),
            action,
            trigger: trigger.into(),
            condition,
            interval,
            ends,
        }
    }

    /// Compile a definition from text fields.
    pub fn compile(
        name: impl Into<String>,
        action: Action,
        trigger: &str,
        parser: &TriggerParser,
        interval: Duration,
        ends: bool,
    ) -> TillerResult<Self> {
        let name = name.into();
        if interval.is_zero() {
            return Err(TillerError::definition(
                ErrorCode::DefInvalidInterval,
                name,
                "interval must be positive",
            ));
        }
        let condition = parser.parse(trigger).map_err(|e| {
            TillerError::definition(ErrorCode::DefInvalidTrigger, name.as_str(), e.to_string())
        })?;
        Ok(Self::new(name, action, trigger, condition, interval, ends))
    }

    /// Compile one entry of a task document.
    ///
    /// Missing `action`, `interval` and `ends` fall back to `do_nothing`,
    /// `default_interval` and one-shot. A missing trigger is an error.
    pub fn from_entry(
        name: &str,
        entry: &serde_json::Value,
        parser: &TriggerParser,
        default_interval: Duration,
    ) -> TillerResult<Self> {
        let raw: RawTask = serde_json::from_value(entry.clone()).map_err(|e| {
            TillerError::definition(ErrorCode::DefMalformed, name, e.to_string())
        })?;

        let action = match raw.action.as_deref().map(str::trim) {
            None | Some("") => Action::default(),
            Some(text) => text.parse::<Action>().map_err(|_| {
                TillerError::definition(
                    ErrorCode::DefUnknownAction,
                    name,
                    format!("unknown action '{}'", text),
                )
            })?,
        };

        let interval = match raw.interval {
            None => default_interval,
            Some(raw) => Duration::from_millis(raw.millis(name)?),
        };

        let ends = match raw.ends {
            None => true,
            Some(raw) => raw.flag(name)?,
        };

        let trigger = match raw.trigger.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(TillerError::definition(
                    ErrorCode::DefMissingTrigger,
                    name,
                    "no trigger given",
                ))
            }
            Some(text) => text,
        };

        Self::compile(name, action, trigger, parser, interval, ends)
    }
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default, alias = "a")]
    action: Option<String>,
    #[serde(default, alias = "t")]
    trigger: Option<String>,
    #[serde(default, alias = "i")]
    interval: Option<RawInterval>,
    #[serde(default, alias = "e")]
    ends: Option<RawEnds>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInterval {
    Number(i64),
    Text(String),
}

impl RawInterval {
    fn millis(&self, task: &str) -> TillerResult<u64> {
        let value = match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse::<i64>().ok(),
        };
        match value {
            Some(ms) if ms > 0 => Ok(ms as u64),
            _ => Err(TillerError::definition(
                ErrorCode::DefInvalidInterval,
                task,
                format!("interval must be a positive number of milliseconds, got {:?}", self),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnds {
    Flag(bool),
    Text(String),
}

impl RawEnds {
    fn flag(&self, task: &str) -> TillerResult<bool> {
        match self {
            Self::Flag(v) => Ok(*v),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" | "true" => Ok(true),
                "n" | "no" | "false" => Ok(false),
                other => Err(TillerError::definition(
                    ErrorCode::DefInvalidEnds,
                    task,
                    format!("ends must be yes/no/true/false/y/n, got '{}'", other),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(entry: serde_json::Value) -> TillerResult<TaskDefinition> {
        TaskDefinition::from_entry(
            "task",
            &entry,
            &TriggerParser::new(),
            Duration::from_millis(DEFAULT_INTERVAL_MS),
        )
    }

    #[test]
    fn test_full_entry() {
        let def = compile(json!({
            "action": "start_sampler",
            "trigger": "EC > 1000 & jars_available",
            "interval": 500,
            "ends": "no"
        }))
        .unwrap();
        assert_eq!(def.action, Action::StartSampler);
        assert_eq!(def.interval, Duration::from_millis(500));
        assert!(!def.ends);
        assert_eq!(def.trigger, "EC > 1000 & jars_available");
    }

    #[test]
    fn test_short_keys_and_defaults() {
        let def = compile(json!({"a": "return_home", "t": "always_true"})).unwrap();
        assert_eq!(def.action, Action::ReturnHome);
        assert_eq!(def.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
        assert!(def.ends);

        let def = compile(json!({"t": "always_true", "i": "250", "e": true})).unwrap();
        assert_eq!(def.action, Action::DoNothing);
        assert_eq!(def.interval, Duration::from_millis(250));
        assert!(def.ends);
    }

    #[test]
    fn test_ends_spellings() {
        for (text, expected) in [("y", true), ("YES", true), ("True", true), ("n", false), ("No", false), ("false", false)] {
            let def = compile(json!({"t": "always_true", "e": text})).unwrap();
            assert_eq!(def.ends, expected, "ends = {}", text);
        }
        let err = compile(json!({"t": "always_true", "e": "maybe"})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefInvalidEnds);
    }

    #[test]
    fn test_rejections() {
        let err = compile(json!({"action": "levitate", "trigger": "always_true"})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefUnknownAction);

        let err = compile(json!({"action": "do_nothing"})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefMissingTrigger);

        let err = compile(json!({"trigger": "EC >"})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefInvalidTrigger);

        let err = compile(json!({"trigger": "always_true", "interval": 0})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefInvalidInterval);

        let err = compile(json!({"trigger": "always_true", "interval": "soon"})).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefInvalidInterval);

        let err = compile(json!("not an object")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DefMalformed);
    }
}
