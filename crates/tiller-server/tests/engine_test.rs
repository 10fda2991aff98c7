//! End-to-end tests: behaviors document, pose feed and return planning.

use std::io::Write;
use std::time::Duration;
use tiller_core::state::names;
use tiller_core::{EngineConfig, UtmPose};
use tiller_server::{run_feed, Engine};

fn at(east: f64, north: f64) -> UtmPose {
    UtmPose::new(500_000.0 + east, 4_000_000.0 + north, 31, true)
}

fn engine_with(doc: &str) -> (tempfile::NamedTempFile, Engine) {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(doc.as_bytes()).unwrap();
    let config = EngineConfig::builder()
        .behaviors_path(file.path())
        .build()
        .unwrap();
    (file, Engine::new(config))
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_low_battery_sends_vehicle_home() {
    let (_doc, mut engine) = engine_with(
        r#"{"go_home": {"action": "return_home",
                        "trigger": "is_autonomous & battery_voltage < 14.5",
                        "interval": 50}}"#,
    );
    let report = engine.start().await.unwrap();
    assert_eq!(report.scheduled_count(), 1);

    let state = engine.state().clone();
    state.set(names::HOME_POSE, at(0.0, 0.5)).unwrap();
    state.set(names::BATTERY_VOLTAGE, 16.2).unwrap();
    state.set(names::IS_AUTONOMOUS, true).unwrap();
    for east in 0..=16 {
        engine.update_pose(at(east as f64, 0.0)).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(engine.actions().latest_route().is_none());

    state.set(names::BATTERY_VOLTAGE, 14.1).unwrap();
    let actions = engine.actions().clone();
    assert!(wait_until(|| actions.latest_route().is_some()).await);

    let route = actions.latest_route().unwrap();
    assert!(!route.direct);
    assert!(route.path.goal_reached);
    assert!(route.path.len() >= 3);
    assert!(state.get_bool(names::IS_GOING_HOME).unwrap());

    // One-shot: the task leaves the registry after firing
    let mut active = 1;
    for _ in 0..200 {
        active = engine.scheduler().active_count().await;
        if active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(active, 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_operator_return_without_trail_goes_direct() {
    let (_doc, mut engine) = engine_with("{}");
    engine.start().await.unwrap();

    let pose = UtmPose::from_lat_lon(47.6, -122.3);
    let input = format!(
        "{{\"pose\": {}}}\n{{\"home\": [47.61, -122.3]}}\n{{\"action\": \"return_home\"}}\n",
        serde_json::to_string(&pose).unwrap()
    );
    let summary = run_feed(&engine, input.as_bytes()).await.unwrap();
    assert_eq!(summary.applied, 3);
    assert_eq!(summary.rejected, 0);

    let route = engine.actions().latest_route().unwrap();
    assert!(route.direct);
    assert_eq!(route.waypoints.len(), 2);
    let (lat, lon) = route.waypoints[1];
    assert!((lat - 47.61).abs() < 1e-6);
    assert!((lon + 122.3).abs() < 1e-6);

    engine.shutdown().await.unwrap();
}
