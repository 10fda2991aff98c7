//! Integration tests for loading behavior documents and running them
//! against a live state store.

use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiller_core::state::names;
use tiller_core::{
    Action, ActionDispatcher, ErrorCode, StateStore, TaskEventKind, TaskScheduler, TillerResult,
    TriggerParser,
};

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(Action, String)>>,
}

impl Recorder {
    fn calls(&self) -> Vec<(Action, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionDispatcher for Recorder {
    async fn dispatch(&self, action: Action, task: &str) -> TillerResult<()> {
        self.calls.lock().unwrap().push((action, task.to_string()));
        Ok(())
    }
}

fn write_doc(suffix: &str, body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

/// A permanent sampling task fires on every poll while its condition holds.
#[tokio::test(start_paused = true)]
async fn test_sampler_task_fires_every_poll() {
    let state = Arc::new(StateStore::vehicle(4));
    let recorder = Arc::new(Recorder::default());
    let scheduler = TaskScheduler::new(state.clone(), recorder.clone());

    state.set(names::EC, 1200.0).unwrap();
    assert!(state.get_bool(names::JARS_AVAILABLE).unwrap());

    let doc = write_doc(
        ".json",
        r#"{"sample": {"action": "start_sampler", "trigger": "EC > 1000 & jars_available",
                       "interval": 500, "ends": "no"}}"#,
    );
    let report = scheduler.load_file(doc.path()).await.unwrap();
    assert_eq!(report.scheduled_count(), 1);
    let id = report.scheduled[0].0;

    // Polls at 0, 500, 1000, 1500 ms
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let calls = recorder.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls
        .iter()
        .all(|(action, task)| *action == Action::StartSampler && task == "sample"));
    assert!(scheduler.is_active(id).await);

    // Dropping conductivity silences the task without removing it
    state.set(names::EC, 900.0).unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(recorder.calls().len(), 4);
    assert!(scheduler.is_active(id).await);
}

/// An unknown action is rejected while its siblings still load.
#[tokio::test(start_paused = true)]
async fn test_unknown_action_skipped() {
    let state = Arc::new(StateStore::vehicle(4));
    let recorder = Arc::new(Recorder::default());
    let scheduler = TaskScheduler::new(state, recorder);

    let doc = write_doc(
        ".yaml",
        "fly:\n  action: levitate\n  trigger: always_true\n\
         go_home:\n  action: return_home\n  trigger: battery_voltage < 14.5\n  ends: yes\n\
         pump:\n  a: start_pump\n  t: is_autonomous & ^(is_going_home)\n  i: 250\n  e: n\n",
    );
    let report = scheduler.load_file(doc.path()).await.unwrap();

    assert_eq!(report.scheduled_count(), 2);
    assert_eq!(report.failed_names(), vec!["fly"]);
    assert_eq!(report.failures[0].1.code(), ErrorCode::DefUnknownAction);
    assert_eq!(scheduler.task_names().await, vec!["go_home", "pump"]);
}

/// Typos in state names fail at load time when the parser knows the namespace.
#[tokio::test(start_paused = true)]
async fn test_unknown_state_rejected_with_known_namespace() {
    let state = Arc::new(StateStore::vehicle(4));
    let recorder = Arc::new(Recorder::default());
    let scheduler = TaskScheduler::new(state.clone(), recorder)
        .with_parser(TriggerParser::new().with_known_states(state.names()));

    let doc = write_doc(
        ".json",
        r#"{"typo": {"trigger": "jar_available"}, "ok": {"trigger": "jars_available"}}"#,
    );
    let report = scheduler.load_file(doc.path()).await.unwrap();
    assert_eq!(report.failed_names(), vec!["typo"]);
    assert_eq!(report.failures[0].1.code(), ErrorCode::DefInvalidTrigger);
}

/// One-shot tasks announce completion and leave the registry.
#[tokio::test(start_paused = true)]
async fn test_one_shot_lifecycle_events() {
    let state = Arc::new(StateStore::vehicle(4));
    let recorder = Arc::new(Recorder::default());
    let scheduler = TaskScheduler::new(state.clone(), recorder.clone());
    let mut events = scheduler.events().subscribe();

    let doc = write_doc(".json", r#"{"arm": {"action": "example", "trigger": "is_autonomous"}}"#);
    scheduler.load_file(doc.path()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(recorder.calls().is_empty());

    state.set(names::IS_AUTONOMOUS, true).unwrap();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(recorder.calls(), vec![(Action::Example, "arm".to_string())]);
    assert_eq!(scheduler.active_count().await, 0);

    let kinds: Vec<TaskEventKind> = events.drain().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![TaskEventKind::Scheduled, TaskEventKind::Fired, TaskEventKind::Completed]
    );
}
