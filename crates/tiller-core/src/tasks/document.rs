//! Task documents: a mapping from task name to definition fields.
//!
//! ```json
//! {
//!   "sample_high_ec": {"action": "start_sampler", "trigger": "EC > 1000 & jars_available",
//!                      "interval": 500, "ends": "no"},
//!   "low_battery":    {"a": "return_home", "t": "battery_voltage < 14.5"}
//! }
//! ```
//!
//! `.txt` documents are read as YAML. YAML accepts plain JSON as well as the
//! looser `name: {action: return_home, trigger: "...", ends: y}` style with
//! unquoted keys.

use crate::error::{TillerError, TillerResult};
use crate::tasks::definition::TaskDefinition;
use crate::trigger::TriggerParser;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Serialization format of a task document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> TillerResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml" | "txt") => Ok(Self::Yaml),
            _ => Err(TillerError::Configuration(format!(
                "Unsupported task document format: {}. Use .json, .yaml or .txt",
                path.display()
            ))),
        }
    }
}

/// A parsed but not yet validated task document.
///
/// Entries are kept as loose values so that one malformed task never keeps
/// its siblings from loading.
#[derive(Debug, Clone, Default)]
pub struct TaskDocument {
    entries: BTreeMap<String, serde_json::Value>,
}

impl TaskDocument {
    /// Parse document text.
    pub fn parse(text: &str, format: DocumentFormat) -> TillerResult<Self> {
        let entries = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| TillerError::Configuration(e.to_string()))?,
        };
        Ok(Self { entries })
    }

    /// Read and parse a document file (`.json`, `.yaml`, `.yml` or `.txt`).
    pub fn from_file(path: impl AsRef<Path>) -> TillerResult<Self> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Task names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile every entry, in name order. Each entry succeeds or fails on
    /// its own.
    pub fn compile(
        &self,
        parser: &TriggerParser,
        default_interval: Duration,
    ) -> Vec<(String, TillerResult<TaskDefinition>)> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    TaskDefinition::from_entry(name, entry, parser, default_interval),
                )
            })
            .collect()
    }
}
