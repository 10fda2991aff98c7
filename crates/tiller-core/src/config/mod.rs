//! Configuration system for tiller.

use crate::error::{TillerError, TillerResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Crumb graph tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrumbConfig {
    /// Max distance in metres for two crumbs to be neighbors.
    pub neighbor_distance_m: f64,
    /// A pose this close to an existing crumb adds nothing.
    pub redundant_distance_m: f64,
    /// Fraction of the neighbor distance a pose must travel from the last
    /// crumb before it becomes a candidate.
    pub insertion_fraction: f64,
    /// Max buffered poses awaiting insertion.
    pub buffer_capacity: usize,
    /// Consumer sleep when the buffer is empty.
    pub idle_backoff_ms: u64,
}

impl Default for CrumbConfig {
    fn default() -> Self {
        Self {
            neighbor_distance_m: 5.0,
            redundant_distance_m: 0.5,
            insertion_fraction: 0.75,
            buffer_capacity: 100,
            idle_backoff_ms: 1000,
        }
    }
}

impl CrumbConfig {
    /// Distance from the last crumb at which a pose becomes a candidate.
    pub fn insertion_distance(&self) -> f64 {
        self.insertion_fraction * self.neighbor_distance_m
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Task document loaded at start-up.
    pub behaviors_path: PathBuf,
    /// Runtime worker threads for task polling.
    pub worker_threads: usize,
    /// Interval for tasks that do not give one.
    pub default_interval_ms: u64,
    /// Radius of `name @ lat,lon` trigger terms.
    pub near_radius_m: f64,
    /// Number of sampler jars.
    pub sampler_jars: usize,
    pub crumbs: CrumbConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let tiller_dir = dirs::home_dir()
            .map(|h| h.join(".tiller"))
            .unwrap_or_else(|| PathBuf::from(".tiller"));

        Self {
            behaviors_path: tiller_dir.join("default_behaviors.json"),
            worker_threads: 4,
            default_interval_ms: 1000,
            near_radius_m: 3.0,
            sampler_jars: 4,
            crumbs: CrumbConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TillerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| TillerError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TillerError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| TillerError::Configuration(e.to_string()))?,
            _ => {
                return Err(TillerError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Unparsable values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `TILLER_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("TILLER_BEHAVIORS_PATH") {
            self.behaviors_path = PathBuf::from(path);
        }
        if let Some(threads) = env_parse("TILLER_WORKER_THREADS") {
            self.worker_threads = threads;
        }
        if let Some(distance) = env_parse("TILLER_NEIGHBOR_DISTANCE") {
            self.crumbs.neighbor_distance_m = distance;
        }
        if let Some(distance) = env_parse("TILLER_REDUNDANT_DISTANCE") {
            self.crumbs.redundant_distance_m = distance;
        }
        if let Some(radius) = env_parse("TILLER_NEAR_RADIUS") {
            self.near_radius_m = radius;
        }
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> TillerResult<()> {
        let bad = |msg: &str| Err(TillerError::Configuration(msg.to_string()));
        if self.worker_threads == 0 {
            return bad("worker_threads must be at least 1");
        }
        if self.default_interval_ms == 0 {
            return bad("default_interval_ms must be positive");
        }
        if self.near_radius_m <= 0.0 {
            return bad("near_radius_m must be positive");
        }
        if self.crumbs.neighbor_distance_m <= 0.0 {
            return bad("crumbs.neighbor_distance_m must be positive");
        }
        if self.crumbs.redundant_distance_m < 0.0
            || self.crumbs.redundant_distance_m >= self.crumbs.neighbor_distance_m
        {
            return bad("crumbs.redundant_distance_m must be in [0, neighbor_distance_m)");
        }
        if !(0.0..=1.0).contains(&self.crumbs.insertion_fraction) {
            return bad("crumbs.insertion_fraction must be in [0, 1]");
        }
        if self.crumbs.buffer_capacity == 0 {
            return bad("crumbs.buffer_capacity must be at least 1");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for EngineConfig.
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn behaviors_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.behaviors_path = path.into();
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn default_interval_ms(mut self, ms: u64) -> Self {
        self.config.default_interval_ms = ms;
        self
    }

    pub fn near_radius_m(mut self, radius: f64) -> Self {
        self.config.near_radius_m = radius;
        self
    }

    pub fn sampler_jars(mut self, jars: usize) -> Self {
        self.config.sampler_jars = jars;
        self
    }

    pub fn crumbs(mut self, crumbs: CrumbConfig) -> Self {
        self.config.crumbs = crumbs;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TillerResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
