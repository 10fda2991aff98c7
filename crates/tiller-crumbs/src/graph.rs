//! Append-only proximity graph of visited locations.
//!
//! Pose updates arrive at the pose filter's rate. They are parked in a small
//! bounded buffer by [`CrumbGraph::submit_pose`] and folded into the graph one
//! at a time by [`CrumbGraph::drain_one`], so a producer only ever takes the
//! buffer lock and never waits on a planner that holds the graph for a whole
//! search.

use crate::error::{CrumbError, CrumbResult};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tiller_core::{CrumbConfig, UtmPose};
use tracing::{debug, warn};

/// Sequential crumb id. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CrumbId(pub u32);

impl CrumbId {
    pub(crate) fn node(self) -> NodeIndex {
        NodeIndex::new(self.0 as usize)
    }
}

impl From<NodeIndex> for CrumbId {
    fn from(node: NodeIndex) -> Self {
        Self(node.index() as u32)
    }
}

impl fmt::Display for CrumbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crumb-{}", self.0)
    }
}

/// A recorded location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crumb {
    pub id: CrumbId,
    pub pose: UtmPose,
}

impl Crumb {
    /// (latitude, longitude) in degrees.
    pub fn lat_lon(&self) -> (f64, f64) {
        self.pose.to_lat_lon()
    }
}

/// Outcome of folding one buffered pose into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    /// Nothing was buffered.
    Empty,
    /// The pose was too close to the trail to matter.
    Skipped,
    Inserted(CrumbId),
}

/// Edge weights are the cached pairwise distance in metres.
pub(crate) type TrailGraph = UnGraph<Crumb, f64, u32>;

/// Graph state guarded by a single lock.
#[derive(Default)]
pub(crate) struct Trail {
    pub(crate) graph: TrailGraph,
    unsent: BTreeSet<CrumbId>,
}

impl Trail {
    pub(crate) fn crumb(&self, id: CrumbId) -> CrumbResult<&Crumb> {
        self.graph
            .node_weight(id.node())
            .ok_or(CrumbError::UnknownCrumb(id))
    }

    /// Most recently inserted crumb. Ids grow with every insertion, so this
    /// is always the highest one.
    pub(crate) fn last(&self) -> Option<&Crumb> {
        let count = self.graph.node_count();
        count
            .checked_sub(1)
            .and_then(|index| self.graph.node_weight(NodeIndex::new(index)))
    }

    /// Apply the growth policy to one pose.
    fn offer(&mut self, pose: UtmPose, config: &CrumbConfig) -> Option<CrumbId> {
        if self.graph.node_count() > 0 {
            if let Some(last) = self.last() {
                if last.pose.distance_to(&pose) < config.insertion_distance() {
                    return None;
                }
            }
            if let Some(near) = self
                .graph
                .node_weights()
                .find(|c| c.pose.distance_to(&pose) <= config.redundant_distance_m)
            {
                debug!(crumb = %near.id, "Pose redundant with existing crumb");
                return None;
            }
        }

        Some(self.insert(pose, config.neighbor_distance_m))
    }

    /// Add a crumb and link it to every crumb within `neighbor_distance`.
    pub(crate) fn insert(&mut self, pose: UtmPose, neighbor_distance: f64) -> CrumbId {
        let id = CrumbId(self.graph.node_count() as u32);
        let node = self.graph.add_node(Crumb { id, pose });

        let links: Vec<(NodeIndex, f64)> = self
            .graph
            .node_indices()
            .filter(|&other| other != node)
            .filter_map(|other| {
                let distance = self.graph[other].pose.distance_to(&pose);
                (distance <= neighbor_distance).then_some((other, distance))
            })
            .collect();
        for &(other, distance) in &links {
            self.graph.add_edge(node, other, distance);
        }
        self.unsent.insert(id);

        if self.graph.node_count() > 1 && links.len() <= 1 {
            warn!(crumb = %id, neighbors = links.len(), "Crumb is poorly connected");
        }
        debug!(
            crumb = %id,
            easting = pose.easting,
            northing = pose.northing,
            neighbors = links.len(),
            "Crumb inserted"
        );
        id
    }

    /// Neighbors of `node` with their cached distance, ordered by id.
    pub(crate) fn neighbors(&self, node: NodeIndex) -> Vec<(NodeIndex, f64)> {
        let mut out: Vec<(NodeIndex, f64)> = self
            .graph
            .edges(node)
            .map(|edge| {
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                (other, *edge.weight())
            })
            .collect();
        out.sort_by_key(|(other, _)| *other);
        out
    }
}

/// The breadcrumb trail.
pub struct CrumbGraph {
    config: CrumbConfig,
    trail: Mutex<Trail>,
    buffer: Mutex<VecDeque<UtmPose>>,
}

impl CrumbGraph {
    pub fn new(config: CrumbConfig) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(config.buffer_capacity)),
            trail: Mutex::new(Trail::default()),
            config,
        }
    }

    pub fn config(&self) -> &CrumbConfig {
        &self.config
    }

    pub(crate) fn trail(&self) -> CrumbResult<MutexGuard<'_, Trail>> {
        Ok(self.trail.lock()?)
    }

    /// Hand a pose to the graph without touching the graph lock.
    ///
    /// Returns `false` when the pose has no fix or sits within the
    /// redundancy radius of the most recently buffered pose. A full buffer
    /// drops its oldest pose.
    pub fn submit_pose(&self, pose: UtmPose) -> CrumbResult<bool> {
        if !pose.is_fixed() {
            return Ok(false);
        }
        let mut buffer = self.buffer.lock()?;
        if let Some(back) = buffer.back() {
            if back.distance_to(&pose) <= self.config.redundant_distance_m {
                return Ok(false);
            }
        }
        if buffer.len() >= self.config.buffer_capacity {
            if let Some(dropped) = buffer.pop_front() {
                warn!(
                    easting = dropped.easting,
                    northing = dropped.northing,
                    "Crumb buffer full, dropping oldest pose"
                );
            }
        }
        buffer.push_back(pose);
        Ok(true)
    }

    /// Poses waiting to be folded in.
    pub fn buffered(&self) -> CrumbResult<usize> {
        Ok(self.buffer.lock()?.len())
    }

    /// Fold the oldest buffered pose into the graph.
    pub fn drain_one(&self) -> CrumbResult<Drained> {
        let next = self.buffer.lock()?.pop_front();
        let Some(pose) = next else {
            return Ok(Drained::Empty);
        };
        let mut trail = self.trail()?;
        Ok(match trail.offer(pose, &self.config) {
            Some(id) => Drained::Inserted(id),
            None => Drained::Skipped,
        })
    }

    /// Fold every buffered pose in. Returns how many crumbs were created.
    pub fn drain_all(&self) -> CrumbResult<usize> {
        let mut inserted = 0;
        loop {
            match self.drain_one()? {
                Drained::Empty => return Ok(inserted),
                Drained::Inserted(_) => inserted += 1,
                Drained::Skipped => {}
            }
        }
    }

    /// Apply the growth policy directly, bypassing the buffer.
    ///
    /// Suitable when poses arrive slowly enough that taking the graph lock
    /// on the producer side does not matter.
    pub fn record_pose(&self, pose: UtmPose) -> CrumbResult<Option<CrumbId>> {
        if !pose.is_fixed() {
            return Ok(None);
        }
        Ok(self.trail()?.offer(pose, &self.config))
    }

    /// Insert a crumb unconditionally.
    pub fn insert_crumb(&self, pose: UtmPose) -> CrumbResult<CrumbId> {
        if !pose.is_fixed() {
            return Err(CrumbError::NoFix(pose.to_string()));
        }
        Ok(self.trail()?.insert(pose, self.config.neighbor_distance_m))
    }

    pub fn len(&self) -> CrumbResult<usize> {
        Ok(self.trail()?.graph.node_count())
    }

    pub fn is_empty(&self) -> CrumbResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn crumb(&self, id: CrumbId) -> CrumbResult<Crumb> {
        self.trail()?.crumb(id).copied()
    }

    /// All crumbs in id order.
    pub fn crumbs(&self) -> CrumbResult<Vec<Crumb>> {
        Ok(self.trail()?.graph.node_weights().copied().collect())
    }

    pub fn last_crumb(&self) -> CrumbResult<Option<Crumb>> {
        Ok(self.trail()?.last().copied())
    }

    /// Neighbors of a crumb with their cached distances, ordered by id.
    pub fn neighbors(&self, id: CrumbId) -> CrumbResult<Vec<(CrumbId, f64)>> {
        let trail = self.trail()?;
        trail.crumb(id)?;
        Ok(trail
            .neighbors(id.node())
            .into_iter()
            .map(|(node, distance)| (CrumbId::from(node), distance))
            .collect())
    }

    /// Oldest crumb not yet acknowledged by the telemetry consumer.
    pub fn next_unsent(&self) -> CrumbResult<Option<Crumb>> {
        let trail = self.trail()?;
        match trail.unsent.first() {
            Some(&id) => Ok(Some(*trail.crumb(id)?)),
            None => Ok(None),
        }
    }

    /// Mark a crumb as delivered. Returns `false` if it already was.
    pub fn acknowledge(&self, id: CrumbId) -> CrumbResult<bool> {
        let mut trail = self.trail()?;
        trail.crumb(id)?;
        Ok(trail.unsent.remove(&id))
    }

    pub fn unsent_count(&self) -> CrumbResult<usize> {
        Ok(self.trail()?.unsent.len())
    }
}

impl fmt::Debug for CrumbGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrumbGraph")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A pose offset from a fixed origin in zone 31N.
    pub(crate) fn at(east: f64, north: f64) -> UtmPose {
        UtmPose::new(500_000.0 + east, 4_000_000.0 + north, 31, true)
    }

    fn graph() -> CrumbGraph {
        CrumbGraph::new(CrumbConfig::default())
    }

    #[test]
    fn test_first_pose_always_inserted() {
        let graph = graph();
        assert_eq!(graph.record_pose(at(0.0, 0.0)).unwrap(), Some(CrumbId(0)));
        assert_eq!(graph.len().unwrap(), 1);
        assert_eq!(graph.last_crumb().unwrap().unwrap().id, CrumbId(0));
    }

    #[test]
    fn test_short_moves_ignored() {
        let graph = graph();
        graph.record_pose(at(0.0, 0.0)).unwrap();
        assert_eq!(graph.record_pose(at(1.0, 0.0)).unwrap(), None);
        assert_eq!(graph.record_pose(at(3.7, 0.0)).unwrap(), None);
        assert_eq!(graph.record_pose(at(3.75, 0.0)).unwrap(), Some(CrumbId(1)));
    }

    #[test]
    fn test_redundant_pose_vs_new_crumb() {
        let graph = graph();
        graph.record_pose(at(0.0, 0.0)).unwrap();
        graph.record_pose(at(4.0, 0.0)).unwrap();
        assert_eq!(graph.len().unwrap(), 2);

        // Within the redundancy radius of the most recent crumb
        assert_eq!(graph.record_pose(at(4.3, 0.0)).unwrap(), None);
        assert_eq!(graph.len().unwrap(), 2);

        // Far enough from the last crumb, within reach of both
        let id = graph.record_pose(at(2.0, 3.9)).unwrap().unwrap();
        assert_eq!(graph.len().unwrap(), 3);
        let neighbors: Vec<CrumbId> = graph
            .neighbors(id)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(neighbors, vec![CrumbId(0), CrumbId(1)]);
    }

    #[test]
    fn test_candidate_near_old_crumb_discarded() {
        let graph = graph();
        for east in [0.0, 4.0, 8.0] {
            graph.record_pose(at(east, 0.0)).unwrap();
        }
        // 3.8 m from the last crumb but on top of crumb 1
        assert_eq!(graph.record_pose(at(4.2, 0.0)).unwrap(), None);
        assert_eq!(graph.len().unwrap(), 3);
    }

    #[test]
    fn test_neighbor_symmetry() {
        let graph = graph();
        let mut poses = Vec::new();
        for i in 0..6 {
            for j in 0..4 {
                let jitter = ((i * 7 + j * 3) % 5) as f64 * 0.4;
                poses.push(at(i as f64 * 3.1 + jitter, j as f64 * 2.7 - jitter));
            }
        }
        for pose in &poses {
            graph.insert_crumb(*pose).unwrap();
        }

        let crumbs = graph.crumbs().unwrap();
        let threshold = graph.config().neighbor_distance_m;
        for a in &crumbs {
            let links = graph.neighbors(a.id).unwrap();
            for b in &crumbs {
                if a.id == b.id {
                    continue;
                }
                let distance = a.pose.distance_to(&b.pose);
                let forward = links.iter().find(|(n, _)| *n == b.id).map(|(_, d)| *d);
                let backward = graph
                    .neighbors(b.id)
                    .unwrap()
                    .into_iter()
                    .find(|(n, _)| *n == a.id)
                    .map(|(_, d)| d);
                assert_eq!(forward, backward);
                assert_eq!(forward.is_some(), distance <= threshold);
                if let Some(cached) = forward {
                    assert_eq!(cached, distance);
                }
            }
        }
    }

    #[test]
    fn test_buffer_dedup_and_drain() {
        let graph = graph();
        assert!(graph.submit_pose(at(0.0, 0.0)).unwrap());
        assert!(!graph.submit_pose(at(0.2, 0.0)).unwrap());
        assert!(!graph.submit_pose(UtmPose::default()).unwrap());
        assert!(graph.submit_pose(at(1.0, 0.0)).unwrap());
        assert!(graph.submit_pose(at(5.0, 0.0)).unwrap());
        assert_eq!(graph.buffered().unwrap(), 3);
        assert!(graph.is_empty().unwrap());

        assert_eq!(graph.drain_one().unwrap(), Drained::Inserted(CrumbId(0)));
        assert_eq!(graph.drain_one().unwrap(), Drained::Skipped);
        assert_eq!(graph.drain_one().unwrap(), Drained::Inserted(CrumbId(1)));
        assert_eq!(graph.drain_one().unwrap(), Drained::Empty);
    }

    #[test]
    fn test_submit_does_not_wait_on_graph_lock() {
        let graph = graph();
        graph.record_pose(at(0.0, 0.0)).unwrap();
        let shared = &graph;
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        std::thread::scope(|scope| {
            // Held the way a running plan holds it
            let trail = shared.trail().unwrap();
            scope.spawn(move || {
                for east in 1..=5 {
                    shared.submit_pose(at(east as f64 * 4.0, 0.0)).unwrap();
                }
                done_tx.send(()).unwrap();
            });

            let finished = done_rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .is_ok();
            let buffered = shared.buffered().unwrap();
            let crumbs = trail.graph.node_count();
            drop(trail);

            assert!(finished, "submit_pose blocked behind the graph lock");
            assert_eq!(buffered, 5);
            assert_eq!(crumbs, 1);
        });

        assert_eq!(graph.drain_all().unwrap(), 5);
        assert_eq!(graph.len().unwrap(), 6);
    }

    #[test]
    fn test_buffer_drops_oldest_when_full() {
        let config = CrumbConfig {
            buffer_capacity: 3,
            ..CrumbConfig::default()
        };
        let graph = CrumbGraph::new(config);
        for i in 0..5 {
            graph.submit_pose(at(i as f64 * 10.0, 0.0)).unwrap();
        }
        assert_eq!(graph.buffered().unwrap(), 3);
        assert_eq!(graph.drain_all().unwrap(), 3);
        assert_eq!(graph.crumb(CrumbId(0)).unwrap().pose, at(20.0, 0.0));
    }

    #[test]
    fn test_unsent_and_acknowledge() {
        let graph = graph();
        for east in [0.0, 4.0, 8.0] {
            graph.record_pose(at(east, 0.0)).unwrap();
        }
        assert_eq!(graph.unsent_count().unwrap(), 3);
        assert_eq!(graph.next_unsent().unwrap().unwrap().id, CrumbId(0));

        assert!(graph.acknowledge(CrumbId(0)).unwrap());
        assert!(!graph.acknowledge(CrumbId(0)).unwrap());
        assert_eq!(graph.next_unsent().unwrap().unwrap().id, CrumbId(1));
        assert!(matches!(
            graph.acknowledge(CrumbId(9)),
            Err(CrumbError::UnknownCrumb(CrumbId(9)))
        ));
    }

    #[test]
    fn test_unfixed_pose_rejected() {
        let graph = graph();
        assert_eq!(graph.record_pose(UtmPose::default()).unwrap(), None);
        assert!(matches!(
            graph.insert_crumb(UtmPose::default()),
            Err(CrumbError::NoFix(_))
        ));
    }
}
