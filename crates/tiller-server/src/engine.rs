//! Engine runtime.
//!
//! Owns the state store, crumb graph, task scheduler and crumb consumer,
//! and gives them a single start-up and shutdown path.

use crate::actions::VehicleActions;
use crate::error::{ServerError, ServerResult};
use std::path::Path;
use std::sync::Arc;
use tiller_core::state::names;
use tiller_core::{
    EngineConfig, LoadReport, StateLog, StateStore, TaskScheduler, TriggerParser, UtmPose,
};
use tiller_crumbs::{CrumbConsumer, CrumbGraph};
use tracing::{debug, info, warn};

/// The behavior engine.
///
/// # Example
///
/// ```ignore
/// let mut engine = Engine::new(EngineConfig::from_env());
/// let report = engine.start().await?;
///
/// engine.update_pose(pose)?;
///
/// engine.shutdown().await?;
/// ```
pub struct Engine {
    config: EngineConfig,
    state: Arc<StateStore>,
    crumbs: Arc<CrumbGraph>,
    actions: Arc<VehicleActions>,
    scheduler: TaskScheduler,
    consumer: Option<CrumbConsumer>,
}

impl Engine {
    /// Create an engine logging state changes through `tracing`.
    ///
    /// Nothing runs until `start()` is called.
    pub fn new(config: EngineConfig) -> Self {
        let state = Arc::new(StateStore::vehicle(config.sampler_jars));
        Self::with_state(config, state)
    }

    /// Create an engine with a custom state logger.
    pub fn with_state_log(config: EngineConfig, log: Arc<dyn StateLog>) -> Self {
        let state = Arc::new(StateStore::vehicle_with_log(config.sampler_jars, log));
        Self::with_state(config, state)
    }

    fn with_state(config: EngineConfig, state: Arc<StateStore>) -> Self {
        debug!(
            jars = config.sampler_jars,
            neighbor_distance_m = config.crumbs.neighbor_distance_m,
            "Creating engine"
        );
        let crumbs = Arc::new(CrumbGraph::new(config.crumbs.clone()));
        let actions = Arc::new(VehicleActions::new(state.clone(), crumbs.clone()));
        let parser = TriggerParser::new()
            .with_known_states(state.names())
            .with_near_radius(config.near_radius_m);
        let scheduler = TaskScheduler::new(state.clone(), actions.clone())
            .with_parser(parser)
            .with_default_interval(config.default_interval());

        Self {
            config,
            state,
            crumbs,
            actions,
            scheduler,
            consumer: None,
        }
    }

    /// Start the crumb consumer and load the behaviors document.
    ///
    /// A missing document is not an error; the engine runs with no tasks.
    pub async fn start(&mut self) -> ServerResult<LoadReport> {
        if self.consumer.is_none() {
            self.consumer = Some(CrumbConsumer::spawn(self.crumbs.clone()));
        }
        self.state.set(names::IS_RUNNING, true)?;

        let path = self.config.behaviors_path.clone();
        if !path.exists() {
            warn!(path = %path.display(), "Behaviors document not found, no tasks loaded");
            return Ok(LoadReport::default());
        }

        let report = self.load_behaviors(&path).await?;
        info!(
            path = %path.display(),
            scheduled = report.scheduled_count(),
            failed = report.failures.len(),
            "Engine started"
        );
        Ok(report)
    }

    /// Load an additional task document.
    pub async fn load_behaviors(&self, path: impl AsRef<Path>) -> ServerResult<LoadReport> {
        Ok(self.scheduler.load_file(path).await?)
    }

    /// Cancel every task and stop the crumb consumer.
    pub async fn shutdown(&mut self) -> ServerResult<()> {
        let cancelled = self.scheduler.cancel_all().await;
        if let Some(consumer) = self.consumer.take() {
            consumer.stop().await;
        }
        self.state.set(names::IS_RUNNING, false)?;
        info!(cancelled, "Engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }

    /// Feed a pose from the pose filter.
    ///
    /// The first fixed pose also records `first_pose` and raises
    /// `has_first_gps`. Poses without a fix are ignored.
    pub fn update_pose(&self, pose: UtmPose) -> ServerResult<()> {
        if !pose.is_fixed() {
            debug!("Ignoring pose without fix");
            return Ok(());
        }
        self.state.set(names::CURRENT_POSE, pose)?;
        if !self.state.get_bool(names::HAS_FIRST_GPS)? {
            self.state.set(names::FIRST_POSE, pose)?;
            self.state.set(names::HAS_FIRST_GPS, true)?;
            info!(%pose, "First GPS fix");
        }
        self.crumbs.submit_pose(pose)?;
        Ok(())
    }

    /// Set the home position from geodetic coordinates.
    pub fn set_home(&self, lat: f64, lon: f64) -> ServerResult<UtmPose> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ServerError::command(format!(
                "home position out of range: {lat}, {lon}"
            )));
        }
        let home = UtmPose::from_lat_lon(lat, lon);
        self.state.set(names::HOME_POSE, home)?;
        info!(%home, "Home position set");
        Ok(home)
    }

    /// Cancel every task without stopping the engine.
    pub async fn reset(&self) -> usize {
        let cancelled = self.scheduler.cancel_all().await;
        info!(cancelled, "Tasks reset");
        cancelled
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn crumbs(&self) -> &Arc<CrumbGraph> {
        &self.crumbs
    }

    pub fn actions(&self) -> &Arc<VehicleActions> {
        &self.actions
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tiller_core::state::MemoryStateLog;

    fn config_with(path: &Path) -> EngineConfig {
        EngineConfig::builder()
            .behaviors_path(path)
            .sampler_jars(2)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_without_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = Engine::new(config_with(&dir.path().join("missing.json")));

        let report = engine.start().await.unwrap();
        assert_eq!(report.scheduled_count(), 0);
        assert!(engine.is_running());
        assert!(engine.state().get_bool(names::IS_RUNNING).unwrap());

        engine.shutdown().await.unwrap();
        assert!(!engine.is_running());
        assert!(!engine.state().get_bool(names::IS_RUNNING).unwrap());
    }

    #[tokio::test]
    async fn test_start_loads_document() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"pump": {{"a": "start_pump", "t": "always_true", "e": "n"}},
                 "bad": {{"a": "start_pump", "t": "no_such_state"}}}}"#
        )
        .unwrap();

        let mut engine = Engine::new(config_with(file.path()));
        let report = engine.start().await.unwrap();
        assert_eq!(report.scheduled_count(), 1);
        assert_eq!(report.failed_names(), vec!["bad"]);
        assert_eq!(engine.scheduler().active_count().await, 1);

        engine.shutdown().await.unwrap();
        assert_eq!(engine.scheduler().active_count().await, 0);
    }

    #[tokio::test]
    async fn test_first_fix_recorded_once() {
        let log = Arc::new(MemoryStateLog::default());
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::with_state_log(config_with(&dir.path().join("none.json")), log.clone());

        engine.update_pose(UtmPose::default()).unwrap();
        assert!(!engine.state().get_bool(names::HAS_FIRST_GPS).unwrap());

        let first = UtmPose::new(500_000.0, 4_000_000.0, 31, true);
        engine.update_pose(first).unwrap();
        engine
            .update_pose(UtmPose::new(500_010.0, 4_000_000.0, 31, true))
            .unwrap();

        assert!(engine.state().get_bool(names::HAS_FIRST_GPS).unwrap());
        assert_eq!(engine.state().get_pose(names::FIRST_POSE).unwrap(), first);
        assert_eq!(log.count(names::HAS_FIRST_GPS), 1);
        assert_eq!(engine.crumbs().buffered().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_set_home_validates_range() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(config_with(&dir.path().join("none.json")));

        let home = engine.set_home(47.6, -122.3).unwrap();
        assert_eq!(engine.state().get_pose(names::HOME_POSE).unwrap(), home);
        assert!(matches!(
            engine.set_home(95.0, 0.0),
            Err(ServerError::Command(_))
        ));
    }
}
