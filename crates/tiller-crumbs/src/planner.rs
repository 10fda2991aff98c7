//! A* return planning over the crumb graph.
//!
//! The whole search runs under the graph lock so the trail cannot grow
//! underneath it. Open crumbs are kept in a `BTreeSet` keyed by
//! `(f, id)`, which makes the expansion order deterministic: equal costs
//! resolve to the lowest crumb id.

use crate::error::{CrumbError, CrumbResult};
use crate::graph::{CrumbGraph, CrumbId, Trail};
use ordered_float::OrderedFloat;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tiller_core::UtmPose;
use tracing::{debug, info, warn};

/// A planned route through the trail, start first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPath {
    pub crumbs: Vec<CrumbId>,
    /// `false` when the path ends at a fallback crumb short of the goal.
    pub goal_reached: bool,
}

impl ReturnPath {
    pub fn len(&self) -> usize {
        self.crumbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crumbs.is_empty()
    }

    pub fn start(&self) -> Option<CrumbId> {
        self.crumbs.first().copied()
    }

    pub fn end(&self) -> Option<CrumbId> {
        self.crumbs.last().copied()
    }
}

impl CrumbGraph {
    /// Plan a path from `start` to `goal`.
    ///
    /// Buffered poses are folded in first. Both endpoints are then inserted
    /// as crumbs so they take part in the proximity graph. When the goal
    /// cannot be reached, the search is retried toward the closest
    /// unattempted crumb that is nearer the goal than the start, at most
    /// once per crumb.
    ///
    /// # Errors
    ///
    /// `CrumbError::Unreachable` when no candidate is left.
    pub fn plan(&self, start: UtmPose, goal: UtmPose) -> CrumbResult<ReturnPath> {
        require_fix(&start)?;
        require_fix(&goal)?;

        let drained = self.drain_all()?;
        let neighbor_distance = self.config().neighbor_distance_m;

        let mut trail = self.trail()?;
        let start_id = trail.insert(start, neighbor_distance);
        let goal_id = trail.insert(goal, neighbor_distance);
        debug!(
            start = %start_id,
            goal = %goal_id,
            crumbs = trail.graph.node_count(),
            drained,
            "Planning return path"
        );

        let path = search(&trail, start_id, goal_id)?;
        info!(
            crumbs = path.len(),
            goal_reached = path.goal_reached,
            "Return path planned"
        );
        Ok(path)
    }

    /// Straight-line fallback: both endpoints become crumbs and the path is
    /// just `[start, goal]`.
    pub fn direct_path(&self, start: UtmPose, goal: UtmPose) -> CrumbResult<ReturnPath> {
        require_fix(&start)?;
        require_fix(&goal)?;

        let neighbor_distance = self.config().neighbor_distance_m;
        let mut trail = self.trail()?;
        let start_id = trail.insert(start, neighbor_distance);
        let goal_id = trail.insert(goal, neighbor_distance);
        Ok(ReturnPath {
            crumbs: vec![start_id, goal_id],
            goal_reached: true,
        })
    }

    /// Latitude/longitude of every crumb on a path.
    pub fn waypoints(&self, path: &ReturnPath) -> CrumbResult<Vec<(f64, f64)>> {
        if path.is_empty() {
            return Err(CrumbError::EmptyPath);
        }
        let trail = self.trail()?;
        path.crumbs
            .iter()
            .map(|&id| trail.crumb(id).map(|c| c.lat_lon()))
            .collect()
    }
}

fn require_fix(pose: &UtmPose) -> CrumbResult<()> {
    if pose.is_fixed() {
        Ok(())
    } else {
        Err(CrumbError::NoFix(pose.to_string()))
    }
}

/// Run A* toward the goal, then toward fallback targets until one is reached.
pub(crate) fn search(trail: &Trail, start: CrumbId, goal: CrumbId) -> CrumbResult<ReturnPath> {
    let goal_pose = trail.crumb(goal)?.pose;
    let start_gap = trail.crumb(start)?.pose.distance_to(&goal_pose);

    let mut attempted: HashSet<NodeIndex> = HashSet::new();
    let mut target = goal.node();

    for _ in 0..trail.graph.node_count() {
        attempted.insert(target);
        if let Some(nodes) = astar(trail, start.node(), target) {
            let crumbs: Vec<CrumbId> = nodes.into_iter().map(CrumbId::from).collect();
            return Ok(ReturnPath {
                goal_reached: target == goal.node(),
                crumbs,
            });
        }

        let fallback = trail
            .graph
            .node_indices()
            .filter(|node| *node != start.node() && !attempted.contains(node))
            .map(|node| (OrderedFloat(trail.graph[node].pose.distance_to(&goal_pose)), node))
            .filter(|(gap, _)| gap.0 < start_gap)
            .min();

        match fallback {
            Some((gap, node)) => {
                warn!(
                    target = %CrumbId::from(node),
                    gap_m = gap.0,
                    "Target unreachable, retrying toward closer crumb"
                );
                target = node;
            }
            None => break,
        }
    }

    Err(CrumbError::Unreachable { start, goal })
}

/// Plain A* with a straight-line heuristic. Returns the node sequence from
/// `start` to `target`, or `None` when the open set runs dry.
fn astar(trail: &Trail, start: NodeIndex, target: NodeIndex) -> Option<Vec<NodeIndex>> {
    let target_pose = trail.graph[target].pose;
    let h = |node: NodeIndex| trail.graph[node].pose.distance_to(&target_pose);

    let mut g: HashMap<NodeIndex, f64> = HashMap::new();
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut open: BTreeSet<(OrderedFloat<f64>, NodeIndex)> = BTreeSet::new();
    let mut closed: HashSet<NodeIndex> = HashSet::new();

    g.insert(start, 0.0);
    open.insert((OrderedFloat(h(start)), start));

    while let Some((_, current)) = open.pop_first() {
        if current == target {
            return Some(reconstruct(&parent, start, target));
        }
        if !closed.insert(current) {
            continue;
        }
        let base = g.get(&current).copied().unwrap_or(f64::INFINITY);

        for (next, distance) in trail.neighbors(current) {
            if closed.contains(&next) {
                continue;
            }
            let tentative = base + distance;
            let known = g.get(&next).copied().unwrap_or(f64::INFINITY);
            if tentative < known {
                if known.is_finite() {
                    open.remove(&(OrderedFloat(known + h(next)), next));
                }
                g.insert(next, tentative);
                parent.insert(next, current);
                open.insert((OrderedFloat(tentative + h(next)), next));
            }
        }
    }
    None
}

fn reconstruct(
    parent: &HashMap<NodeIndex, NodeIndex>,
    start: NodeIndex,
    target: NodeIndex,
) -> Vec<NodeIndex> {
    let mut path = vec![target];
    let mut node = target;
    while node != start {
        match parent.get(&node) {
            Some(&previous) => {
                path.push(previous);
                node = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
