//! The shared vehicle state store.

use crate::error::{TillerError, TillerResult};
use crate::geo::UtmPose;
use crate::state::cell::{Cell, DerivedCell, FlagCell, NumericCell, StateCell};
use crate::state::log::{LogPolicy, StateLog, TracingStateLog};
use crate::state::names;
use crate::state::value::{StateValue, ValueKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Read access to named state, as seen by conditions.
#[cfg_attr(test, mockall::automock)]
pub trait StateSource: Send + Sync {
    /// Read one slot of a named entry.
    fn read(&self, name: &str, index: usize) -> TillerResult<StateValue>;

    /// Current pose, used by proximity conditions.
    fn current_pose(&self) -> TillerResult<UtmPose> {
        self.read(names::CURRENT_POSE, 0)?
            .as_pose()
            .ok_or_else(|| TillerError::kind_mismatch(names::CURRENT_POSE, "pose", "other"))
    }
}

struct StateEntry {
    cell: Cell,
    policy: LogPolicy,
    order: Mutex<()>,
}

/// Typed mapping from state name to value.
///
/// The set of names is fixed at construction. Every operation takes `&self`
/// and is safe to call from any thread.
pub struct StateStore {
    entries: HashMap<String, StateEntry>,
    jars: Arc<Vec<AtomicBool>>,
    log: Arc<dyn StateLog>,
}

impl StateStore {
    /// Start building a custom store.
    pub fn builder() -> StateStoreBuilder {
        StateStoreBuilder::default()
    }

    /// The full vehicle namespace with `jar_count` sampler jars, logging
    /// through `tracing`.
    pub fn vehicle(jar_count: usize) -> Self {
        Self::vehicle_with_log(jar_count, Arc::new(TracingStateLog))
    }

    /// The full vehicle namespace with a custom state logger.
    pub fn vehicle_with_log(jar_count: usize, log: Arc<dyn StateLog>) -> Self {
        let created = Instant::now();
        let mut builder = Self::builder().jars(jar_count).log(log);
        let jars = builder.jars.clone();

        // Demonstration entries, handy for exercising triggers.
        let toggle = Arc::new(AtomicBool::new(false));
        builder = builder.entry(
            names::EXAMPLE_STATE,
            Cell::derived(ValueKind::Bool, move |_| {
                StateValue::Bool(!toggle.fetch_xor(true, Ordering::SeqCst))
            }),
            LogPolicy::Never,
        );
        let counter = Arc::new(Mutex::new(0.0_f64));
        builder = builder.entry(
            names::EXAMPLE_VALUE,
            Cell::derived(ValueKind::Double, move |_| {
                let mut value = counter.lock().unwrap_or_else(|e| e.into_inner());
                *value += 1.0;
                StateValue::Double(*value)
            }),
            LogPolicy::Never,
        );
        let shared = Arc::new(AtomicI64::new(0));
        builder = builder.entry(
            names::EXAMPLE_ARRAY,
            Cell::Derived(DerivedCell::new(
                ValueKind::Long,
                3,
                Box::new(move |_| StateValue::Long(shared.fetch_add(1, Ordering::SeqCst) + 1)),
            )),
            LogPolicy::Never,
        );

        // Sensor channels
        for name in [names::EC, names::DO, names::T, names::PH, names::WATER_DEPTH] {
            builder = builder.entry(name, Cell::double(0.0), LogPolicy::Never);
        }
        builder = builder.entry(names::BATTERY_VOLTAGE, Cell::double(0.0), LogPolicy::OnChange);

        builder = builder
            .entry(names::CURRENT_POSE, Cell::pose(), LogPolicy::Never)
            .entry(names::HOME_POSE, Cell::pose(), LogPolicy::OnChange)
            .entry(names::FIRST_POSE, Cell::pose(), LogPolicy::OnChange);

        builder = builder.entry(
            names::ELAPSED_TIME,
            Cell::derived(ValueKind::Long, move |_| {
                StateValue::Long(created.elapsed().as_millis() as i64)
            }),
            LogPolicy::Never,
        );

        // Milliseconds since store creation at which the operator was last seen.
        let operator_stamp = Arc::new(AtomicU64::new(0));
        let stamp_reader = operator_stamp.clone();
        builder = builder.entry(
            names::TIME_SINCE_OPERATOR,
            Cell::Derived(
                DerivedCell::new(
                    ValueKind::Long,
                    1,
                    Box::new(move |_| {
                        let now = created.elapsed().as_millis() as u64;
                        StateValue::Long(now.saturating_sub(stamp_reader.load(Ordering::SeqCst)) as i64)
                    }),
                )
                .with_setter(Box::new(move |_, _| {
                    operator_stamp.store(created.elapsed().as_millis() as u64, Ordering::SeqCst);
                    Ok(StateValue::Long(0))
                })),
            ),
            LogPolicy::Never,
        );

        for name in [names::IS_CONNECTED, names::IS_RUNNING, names::PUMP_ON] {
            builder = builder.entry(name, Cell::flag(false), LogPolicy::Never);
        }
        for name in [
            names::IS_AUTONOMOUS,
            names::HAS_FIRST_AUTONOMY,
            names::HAS_FIRST_GPS,
            names::IS_GOING_HOME,
            names::IS_TAKING_SAMPLE,
            names::RC_OVERRIDE,
        ] {
            builder = builder.entry(name, Cell::flag(false), LogPolicy::OnChange);
        }

        let scan = jars.clone();
        builder = builder.entry(
            names::NEXT_JAR,
            Cell::derived(ValueKind::Int, move |_| StateValue::Int(first_available(&scan))),
            LogPolicy::OnChange,
        );
        builder = builder.entry(
            names::JARS_AVAILABLE,
            Cell::derived(ValueKind::Bool, move |_| {
                StateValue::Bool(first_available(&jars) >= 0)
            }),
            LogPolicy::OnChange,
        );

        builder = builder
            .entry(names::ALWAYS_TRUE, Cell::derived(ValueKind::Bool, |_| StateValue::Bool(true)), LogPolicy::Never)
            .entry(names::ALWAYS_FALSE, Cell::derived(ValueKind::Bool, |_| StateValue::Bool(false)), LogPolicy::Never);

        builder.build()
    }

    /// Read the first slot of an entry.
    pub fn get(&self, name: &str) -> TillerResult<StateValue> {
        self.get_at(name, 0)
    }

    /// Read one slot of an entry.
    pub fn get_at(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        let entry = self.entry(name, index)?;
        entry.cell.get(name, index)
    }

    /// Read a boolean entry.
    pub fn get_bool(&self, name: &str) -> TillerResult<bool> {
        let value = self.get(name)?;
        value
            .as_bool()
            .ok_or_else(|| TillerError::kind_mismatch(name, "bool", value.kind().to_string()))
    }

    /// Read any numeric entry as `f64`.
    pub fn get_f64(&self, name: &str) -> TillerResult<f64> {
        let value = self.get(name)?;
        value
            .as_f64()
            .ok_or_else(|| TillerError::kind_mismatch(name, "number", value.kind().to_string()))
    }

    /// Read a pose entry.
    pub fn get_pose(&self, name: &str) -> TillerResult<UtmPose> {
        let value = self.get(name)?;
        value
            .as_pose()
            .ok_or_else(|| TillerError::kind_mismatch(name, "pose", value.kind().to_string()))
    }

    /// Write the first slot of an entry.
    pub fn set(&self, name: &str, value: impl Into<StateValue>) -> TillerResult<()> {
        self.set_at(name, 0, value)
    }

    /// Write one slot of an entry, logging according to its policy.
    pub fn set_at(&self, name: &str, index: usize, value: impl Into<StateValue>) -> TillerResult<()> {
        let entry = self.entry(name, index)?;
        let value = value.into();
        if entry.policy == LogPolicy::Never {
            entry.cell.set(name, index, value)?;
            return Ok(());
        }

        // Logged writes to one entry are serialized so records follow write order.
        let _order = entry.order.lock().unwrap_or_else(|e| e.into_inner());
        let written = entry.cell.set(name, index, value)?;
        if entry.policy == LogPolicy::EverySet || written.changed() {
            self.log.record(name, index, &written.stored);
        }
        Ok(())
    }

    /// Write every slot of an entry.
    pub fn set_all(&self, name: &str, value: impl Into<StateValue>) -> TillerResult<()> {
        let value = value.into();
        let len = self.len(name)?;
        for index in 0..len {
            self.set_at(name, index, value)?;
        }
        Ok(())
    }

    /// Number of slots in an entry.
    pub fn len(&self, name: &str) -> TillerResult<usize> {
        self.entries
            .get(name)
            .map(|e| e.cell.len())
            .ok_or_else(|| TillerError::not_found(name))
    }

    /// Value kind of an entry.
    pub fn kind(&self, name: &str) -> TillerResult<ValueKind> {
        self.entries
            .get(name)
            .map(|e| e.cell.kind())
            .ok_or_else(|| TillerError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of sampler jars.
    pub fn jar_count(&self) -> usize {
        self.jars.len()
    }

    /// Mark a sampler jar as used.
    pub fn use_jar(&self, index: usize) -> TillerResult<()> {
        if index >= self.jars.len() {
            return Err(TillerError::index_out_of_range("jar", index, self.jars.len()));
        }
        self.update_jars(|jars| jars[index].store(false, Ordering::SeqCst));
        debug!(jar = index, "Sampler jar used");
        Ok(())
    }

    /// Mark every sampler jar as available again.
    pub fn reset_jars(&self) {
        self.update_jars(|jars| {
            for jar in jars.iter() {
                jar.store(true, Ordering::SeqCst);
            }
        });
        debug!(jars = self.jars.len(), "Sampler jars reset");
    }

    /// Apply a jar mutation and log the derived jar entries if they changed.
    fn update_jars(&self, mutate: impl FnOnce(&[AtomicBool])) {
        let before = self.jar_snapshot();
        mutate(self.jars.as_slice());
        let after = self.jar_snapshot();
        for ((name, old), (_, new)) in before.into_iter().zip(after) {
            if old != new {
                if let Some(value) = new {
                    self.log.record(name, 0, &value);
                }
            }
        }
    }

    fn jar_snapshot(&self) -> Vec<(&'static str, Option<StateValue>)> {
        [names::NEXT_JAR, names::JARS_AVAILABLE]
            .into_iter()
            .filter(|name| {
                self.entries
                    .get(*name)
                    .is_some_and(|e| e.policy == LogPolicy::OnChange)
            })
            .map(|name| (name, self.get(name).ok()))
            .collect()
    }

    fn entry(&self, name: &str, index: usize) -> TillerResult<&StateEntry> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| TillerError::not_found(name))?;
        let len = entry.cell.len();
        if index >= len {
            return Err(TillerError::index_out_of_range(name, index, len));
        }
        Ok(entry)
    }
}

impl StateSource for StateStore {
    fn read(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        self.get_at(name, index)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("entries", &self.entries.len())
            .field("jars", &self.jars.len())
            .finish()
    }
}

/// First available jar index, or -1.
fn first_available(jars: &[AtomicBool]) -> i32 {
    jars.iter()
        .position(|jar| jar.load(Ordering::SeqCst))
        .map(|i| i as i32)
        .unwrap_or(-1)
}

/// Builder for [`StateStore`].
pub struct StateStoreBuilder {
    entries: HashMap<String, StateEntry>,
    jars: Arc<Vec<AtomicBool>>,
    log: Arc<dyn StateLog>,
}

impl Default for StateStoreBuilder {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            jars: Arc::new(Vec::new()),
            log: Arc::new(TracingStateLog),
        }
    }
}

impl StateStoreBuilder {
    /// Register an entry. A later entry with the same name replaces the earlier one.
    pub fn entry(mut self, name: impl Into<String>, cell: Cell, policy: LogPolicy) -> Self {
        let name = name.into();
        if self.entries.contains_key(&name) {
            warn!(state = %name, "State entry registered twice; keeping the last one");
        }
        self.entries.insert(
            name,
            StateEntry {
                cell,
                policy,
                order: Mutex::new(()),
            },
        );
        self
    }

    /// Register a boolean array entry.
    pub fn flags(self, name: impl Into<String>, len: usize, initial: bool, policy: LogPolicy) -> Self {
        self.entry(name, Cell::Flag(FlagCell::new(len, initial)), policy)
    }

    /// Register a double array entry.
    pub fn doubles(self, name: impl Into<String>, len: usize, initial: f64, policy: LogPolicy) -> Self {
        self.entry(name, Cell::Numeric(NumericCell::double(len, initial)), policy)
    }

    /// Set the number of sampler jars (all available).
    pub fn jars(mut self, count: usize) -> Self {
        self.jars = Arc::new((0..count).map(|_| AtomicBool::new(true)).collect());
        self
    }

    /// Set the state-change logger.
    pub fn log(mut self, log: Arc<dyn StateLog>) -> Self {
        self.log = log;
        self
    }

    pub fn build(self) -> StateStore {
        StateStore {
            entries: self.entries,
            jars: self.jars,
            log: self.log,
        }
    }
}
