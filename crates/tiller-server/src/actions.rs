//! Default action dispatcher for the vehicle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tiller_core::state::names;
use tiller_core::{Action, ActionDispatcher, StateStore, TillerError, TillerResult};
use tiller_crumbs::{CrumbGraph, ReturnPath};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Route published by `return_home`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeRoute {
    pub path: ReturnPath,
    /// (latitude, longitude) for every crumb of `path`.
    pub waypoints: Vec<(f64, f64)>,
    /// The planner failed and this is the straight line.
    pub direct: bool,
    pub planned_at: DateTime<Utc>,
}

/// Carries out actions against the state store and crumb graph.
pub struct VehicleActions {
    state: Arc<StateStore>,
    crumbs: Arc<CrumbGraph>,
    route: watch::Sender<Option<HomeRoute>>,
}

impl VehicleActions {
    pub fn new(state: Arc<StateStore>, crumbs: Arc<CrumbGraph>) -> Self {
        let (route, _) = watch::channel(None);
        Self {
            state,
            crumbs,
            route,
        }
    }

    /// Watch for new home routes.
    pub fn subscribe_route(&self) -> watch::Receiver<Option<HomeRoute>> {
        self.route.subscribe()
    }

    pub fn latest_route(&self) -> Option<HomeRoute> {
        self.route.borrow().clone()
    }

    fn start_sampler(&self, consume_jar: bool) -> TillerResult<()> {
        let next = self
            .state
            .get(names::NEXT_JAR)?
            .as_i64()
            .unwrap_or(-1);
        if next < 0 {
            warn!("No sampler jar available");
            return Ok(());
        }
        if consume_jar {
            self.state.use_jar(next as usize)?;
        }
        self.state.set(names::IS_TAKING_SAMPLE, true)?;
        info!(jar = next, test = !consume_jar, "Sampling started");
        Ok(())
    }

    async fn return_home(&self) -> TillerResult<()> {
        let start = self.state.get_pose(names::CURRENT_POSE)?;
        let goal = self.state.get_pose(names::HOME_POSE)?;

        let crumbs = Arc::clone(&self.crumbs);
        let route = tokio::task::spawn_blocking(move || -> TillerResult<HomeRoute> {
            let (path, direct) = match crumbs.plan(start, goal) {
                Ok(path) => (path, false),
                Err(e) if e.is_planning_failure() => {
                    warn!(error = %e, "Planning failed, heading straight home");
                    (crumbs.direct_path(start, goal)?, true)
                }
                Err(e) => return Err(e.into()),
            };
            let waypoints = crumbs.waypoints(&path)?;
            Ok(HomeRoute {
                path,
                waypoints,
                direct,
                planned_at: Utc::now(),
            })
        })
        .await
        .map_err(|e| TillerError::internal(format!("return planning task failed: {e}")))??;

        info!(
            waypoints = route.waypoints.len(),
            direct = route.direct,
            goal_reached = route.path.goal_reached,
            "Returning home"
        );
        self.state.set(names::IS_GOING_HOME, true)?;
        self.route.send_replace(Some(route));
        Ok(())
    }
}

#[async_trait]
impl ActionDispatcher for VehicleActions {
    async fn dispatch(&self, action: Action, task: &str) -> TillerResult<()> {
        debug!(task = %task, action = %action, "Dispatching action");
        match action {
            Action::StartSampler => self.start_sampler(true),
            Action::StartSamplerTest => self.start_sampler(false),
            Action::SamplerStop => self.state.set(names::IS_TAKING_SAMPLE, false),
            Action::SamplerReset => {
                self.state.reset_jars();
                self.state.set(names::IS_TAKING_SAMPLE, false)
            }
            Action::ReturnHome => self.return_home().await,
            Action::StartPump => self.state.set(names::PUMP_ON, true),
            Action::StopPump => self.state.set(names::PUMP_ON, false),
            Action::Example => {
                info!(task = %task, "Example action");
                Ok(())
            }
            Action::DoNothing => Ok(()),
        }
    }
}
