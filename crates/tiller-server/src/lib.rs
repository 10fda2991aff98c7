//! tiller-server - Behavior engine runtime for tiller.
//!
//! Wires the state store, task scheduler and crumb graph into an [`Engine`],
//! provides the default vehicle action dispatcher, and reads operator
//! commands from a newline-delimited JSON feed.
//!
//! # Example
//!
//! ```ignore
//! use tiller_server::{run_feed, Engine};
//!
//! let mut engine = Engine::new(EngineConfig::from_env());
//! engine.start().await?;
//!
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! run_feed(&engine, stdin).await?;
//!
//! engine.shutdown().await?;
//! ```

pub mod actions;
pub mod commands;
pub mod engine;
pub mod error;

pub use actions::{HomeRoute, VehicleActions};
pub use commands::{apply, run_feed, Command, FeedSummary};
pub use engine::Engine;
pub use error::{ServerError, ServerResult};
