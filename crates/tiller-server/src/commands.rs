//! Line-oriented JSON command feed.
//!
//! Each line is one object with a single key:
//!
//! ```text
//! {"pose": {"easting": 500000.0, "northing": 4000000.0, "zone": 31, "north": true}}
//! {"set": {"name": "EC", "value": 1200.0}}
//! {"set": {"name": "example_array", "index": 2, "value": 1.0}}
//! {"home": [47.6, -122.3]}
//! {"action": "return_home"}
//! {"reset": true}
//! ```

use crate::engine::Engine;
use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use tiller_core::{Action, ActionDispatcher, StateValue, UtmPose};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Task name reported for actions requested over the feed.
pub const OPERATOR: &str = "operator";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Pose(UtmPose),
    Set(SetCommand),
    /// Latitude, longitude in degrees.
    Home(f64, f64),
    Action(String),
    Reset(bool),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetCommand {
    pub name: String,
    pub value: StateValue,
    #[serde(default)]
    pub index: Option<usize>,
}

impl Command {
    pub fn parse(line: &str) -> ServerResult<Self> {
        serde_json::from_str(line).map_err(|e| ServerError::command(e.to_string()))
    }
}

/// Lines handled by [`run_feed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Apply one command to the engine.
pub async fn apply(engine: &Engine, command: Command) -> ServerResult<()> {
    match command {
        Command::Pose(pose) => engine.update_pose(pose),
        Command::Set(SetCommand { name, value, index }) => {
            match index {
                Some(index) => engine.state().set_at(&name, index, value)?,
                None => engine.state().set(&name, value)?,
            }
            Ok(())
        }
        Command::Home(lat, lon) => engine.set_home(lat, lon).map(|_| ()),
        Command::Action(name) => {
            let action: Action = name
                .parse()
                .map_err(|_| ServerError::command(format!("unknown action: {name}")))?;
            engine.actions().dispatch(action, OPERATOR).await?;
            Ok(())
        }
        Command::Reset(true) => {
            engine.reset().await;
            Ok(())
        }
        Command::Reset(false) => Ok(()),
    }
}

/// Read commands until the input closes.
///
/// Bad lines are logged and skipped; only a read failure ends the feed
/// early.
pub async fn run_feed<R>(engine: &Engine, reader: R) -> ServerResult<FeedSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = FeedSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outcome = match Command::parse(line) {
            Ok(command) => {
                debug!(?command, "Command received");
                apply(engine, command).await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                warn!(code = e.code(), error = %e, "Command rejected");
                summary.rejected += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiller_core::state::names;
    use tiller_core::EngineConfig;

    fn engine() -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::builder()
            .behaviors_path(dir.path().join("none.json"))
            .build()
            .unwrap();
        (dir, Engine::new(config))
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            Command::parse(r#"{"pose": {"easting": 1.0, "northing": 2.0, "zone": 31}}"#).unwrap(),
            Command::Pose(UtmPose::new(1.0, 2.0, 31, true))
        );
        assert_eq!(
            Command::parse(r#"{"home": [47.6, -122.3]}"#).unwrap(),
            Command::Home(47.6, -122.3)
        );
        assert_eq!(
            Command::parse(r#"{"set": {"name": "EC", "value": 1200.5}}"#).unwrap(),
            Command::Set(SetCommand {
                name: "EC".to_string(),
                value: StateValue::Double(1200.5),
                index: None,
            })
        );
        assert_eq!(
            Command::parse(r#"{"reset": true}"#).unwrap(),
            Command::Reset(true)
        );
        assert!(matches!(
            Command::parse(r#"{"warp": 9}"#),
            Err(ServerError::Command(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_set_with_index() {
        let (_dir, engine) = engine();
        let command = Command::parse(r#"{"set": {"name": "rc_override", "value": true}}"#).unwrap();
        apply(&engine, command).await.unwrap();
        assert!(engine.state().get_bool(names::RC_OVERRIDE).unwrap());

        let command =
            Command::parse(r#"{"set": {"name": "EC", "index": 3, "value": 1.0}}"#).unwrap();
        let err = apply(&engine, command).await.unwrap_err();
        assert_eq!(err.code(), "STATE_002");
    }

    #[tokio::test]
    async fn test_unknown_action_rejected() {
        let (_dir, engine) = engine();
        let err = apply(&engine, Command::Action("levitate".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BAD_COMMAND");
    }

    #[tokio::test]
    async fn test_feed_counts_lines() {
        let (_dir, engine) = engine();
        let input = concat!(
            r#"{"pose": {"easting": 500000.0, "northing": 4000000.0, "zone": 31, "north": true}}"#,
            "\n",
            r#"{"set": {"name": "EC", "value": 1200}}"#,
            "\n\n",
            r#"{"action": "start_pump"}"#,
            "\n",
            "not json\n",
            r#"{"reset": true}"#,
            "\n",
        );

        let summary = run_feed(&engine, input.as_bytes()).await.unwrap();
        assert_eq!(
            summary,
            FeedSummary {
                applied: 4,
                rejected: 1
            }
        );
        assert_eq!(engine.state().get_f64(names::EC).unwrap(), 1200.0);
        assert!(engine.state().get_bool(names::PUMP_ON).unwrap());
        assert!(engine.state().get_bool(names::HAS_FIRST_GPS).unwrap());
    }
}
