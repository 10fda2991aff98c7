//! tiller-crumbs - Breadcrumb trail and return planner for tiller.
//!
//! The vehicle lays a crumb every few metres as it moves. Crumbs close
//! enough to each other are linked, and the resulting proximity graph is
//! searched with A* to bring the vehicle home along water it has already
//! crossed.
//!
//! # Example
//!
//! ```ignore
//! use tiller_crumbs::{CrumbConsumer, CrumbGraph};
//!
//! let graph = Arc::new(CrumbGraph::new(config.crumbs.clone()));
//! let consumer = CrumbConsumer::spawn(graph.clone());
//!
//! graph.submit_pose(pose)?;
//! let path = graph.plan(current, home)?;
//! let waypoints = graph.waypoints(&path)?;
//! ```

mod consumer;
mod error;
mod graph;
mod planner;

pub use consumer::CrumbConsumer;
pub use error::{CrumbError, CrumbResult};
pub use graph::{Crumb, CrumbGraph, CrumbId, Drained};
pub use planner::ReturnPath;
