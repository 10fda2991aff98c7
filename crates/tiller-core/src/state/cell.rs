//! Storage cells behind state entries.
//!
//! Each cell owns its own synchronization: flags and numbers are atomics,
//! poses sit behind a per-slot lock, and derived cells compute on read. The
//! store map itself never changes after construction, so unrelated entries
//! never contend.

use crate::error::{TillerError, TillerResult};
use crate::geo::UtmPose;
use crate::state::value::{StateValue, ValueKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Read function of a derived cell, called with the slot index.
pub type Getter = Box<dyn Fn(usize) -> StateValue + Send + Sync>;
/// Write function of a derived cell. Returns the value now observable.
pub type Setter = Box<dyn Fn(usize, StateValue) -> TillerResult<StateValue> + Send + Sync>;

/// Result of one write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Written {
    /// Value the slot held just before this write, swapped out atomically.
    /// `None` for unset poses and derived cells.
    pub previous: Option<StateValue>,
    /// Value stored after conversion.
    pub stored: StateValue,
}

impl Written {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.stored)
    }
}

/// Capabilities every cell provides.
pub trait StateCell: Send + Sync {
    /// Number of slots.
    fn len(&self) -> usize;

    /// Kind of value this cell produces.
    fn kind(&self) -> ValueKind;

    /// Read a slot, running any derived computation.
    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue>;

    /// Write a slot.
    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written>;
}

fn slot<'a, T>(slots: &'a [T], name: &str, index: usize) -> TillerResult<&'a T> {
    slots
        .get(index)
        .ok_or_else(|| TillerError::index_out_of_range(name, index, slots.len()))
}

/// Atomic boolean slots.
pub struct FlagCell {
    slots: Vec<AtomicBool>,
}

impl FlagCell {
    pub fn new(len: usize, initial: bool) -> Self {
        Self {
            slots: (0..len).map(|_| AtomicBool::new(initial)).collect(),
        }
    }
}

impl StateCell for FlagCell {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        let flag = slot(&self.slots, name, index)?;
        Ok(StateValue::Bool(flag.load(Ordering::SeqCst)))
    }

    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written> {
        let target = slot(&self.slots, name, index)?;
        let flag = value
            .as_bool()
            .ok_or_else(|| TillerError::kind_mismatch(name, "bool", value.kind().to_string()))?;
        let previous = target.swap(flag, Ordering::SeqCst);
        Ok(Written {
            previous: Some(StateValue::Bool(previous)),
            stored: StateValue::Bool(flag),
        })
    }
}

/// Numeric slots stored as raw bits in atomics.
///
/// Writes accept any numeric kind and convert to the cell's own kind.
pub struct NumericCell {
    kind: ValueKind,
    slots: Vec<AtomicU64>,
}

impl NumericCell {
    pub fn int(len: usize, initial: i32) -> Self {
        Self::with_bits(ValueKind::Int, len, (initial as i64) as u64)
    }

    pub fn long(len: usize, initial: i64) -> Self {
        Self::with_bits(ValueKind::Long, len, initial as u64)
    }

    pub fn double(len: usize, initial: f64) -> Self {
        Self::with_bits(ValueKind::Double, len, initial.to_bits())
    }

    fn with_bits(kind: ValueKind, len: usize, bits: u64) -> Self {
        Self {
            kind,
            slots: (0..len).map(|_| AtomicU64::new(bits)).collect(),
        }
    }

    fn decode(&self, bits: u64) -> StateValue {
        match self.kind {
            ValueKind::Int => StateValue::Int(bits as i64 as i32),
            ValueKind::Long => StateValue::Long(bits as i64),
            _ => StateValue::Double(f64::from_bits(bits)),
        }
    }

    fn convert(&self, name: &str, value: StateValue) -> TillerResult<(u64, StateValue)> {
        let mismatch = || TillerError::kind_mismatch(name, self.kind.to_string(), value.kind().to_string());
        let converted = match (self.kind, value) {
            (_, StateValue::Bool(_)) | (_, StateValue::Pose(_)) => return Err(mismatch()),
            (ValueKind::Int, StateValue::Int(v)) => StateValue::Int(v),
            (ValueKind::Int, StateValue::Long(v)) => {
                StateValue::Int(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            }
            (ValueKind::Int, StateValue::Double(v)) => StateValue::Int(v as i32),
            (ValueKind::Long, other) => StateValue::Long(other.as_i64().ok_or_else(mismatch)?),
            (_, other) => StateValue::Double(other.as_f64().ok_or_else(mismatch)?),
        };
        let bits = match converted {
            StateValue::Int(v) => (v as i64) as u64,
            StateValue::Long(v) => v as u64,
            StateValue::Double(v) => v.to_bits(),
            _ => return Err(mismatch()),
        };
        Ok((bits, converted))
    }
}

impl StateCell for NumericCell {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn kind(&self) -> ValueKind {
        self.kind
    }

    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        let bits = slot(&self.slots, name, index)?.load(Ordering::SeqCst);
        Ok(self.decode(bits))
    }

    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written> {
        let target = slot(&self.slots, name, index)?;
        let (bits, stored) = self.convert(name, value)?;
        let previous = self.decode(target.swap(bits, Ordering::SeqCst));
        Ok(Written {
            previous: Some(previous),
            stored,
        })
    }
}

/// Pose slots, empty until the first write.
pub struct PoseCell {
    slots: Vec<RwLock<Option<UtmPose>>>,
}

impl PoseCell {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| RwLock::new(None)).collect(),
        }
    }
}

impl StateCell for PoseCell {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Pose
    }

    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        let pose = slot(&self.slots, name, index)?
            .read()
            .map_err(|e| TillerError::internal(e.to_string()))?;
        pose.map(StateValue::Pose)
            .ok_or_else(|| TillerError::unset(name, index))
    }

    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written> {
        let target = slot(&self.slots, name, index)?;
        let pose = value
            .as_pose()
            .ok_or_else(|| TillerError::kind_mismatch(name, "pose", value.kind().to_string()))?;
        let previous = target
            .write()
            .map_err(|e| TillerError::internal(e.to_string()))?
            .replace(pose);
        Ok(Written {
            previous: previous.map(StateValue::Pose),
            stored: StateValue::Pose(pose),
        })
    }
}

/// A value computed on every read, optionally with a custom writer.
pub struct DerivedCell {
    kind: ValueKind,
    len: usize,
    getter: Getter,
    setter: Option<Setter>,
}

impl DerivedCell {
    pub fn new(kind: ValueKind, len: usize, getter: Getter) -> Self {
        Self {
            kind,
            len,
            getter,
            setter: None,
        }
    }

    /// Attach a writer. Without one, writes fail with `ReadOnly`.
    pub fn with_setter(mut self, setter: Setter) -> Self {
        self.setter = Some(setter);
        self
    }

    fn check(&self, name: &str, index: usize) -> TillerResult<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(TillerError::index_out_of_range(name, index, self.len))
        }
    }
}

impl StateCell for DerivedCell {
    fn len(&self) -> usize {
        self.len
    }

    fn kind(&self) -> ValueKind {
        self.kind
    }

    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        self.check(name, index)?;
        Ok((self.getter)(index))
    }

    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written> {
        self.check(name, index)?;
        match &self.setter {
            Some(setter) => Ok(Written {
                previous: None,
                stored: setter(index, value)?,
            }),
            None => Err(TillerError::read_only(name)),
        }
    }
}

/// The closed set of cell variants a state entry can hold.
pub enum Cell {
    Flag(FlagCell),
    Numeric(NumericCell),
    Pose(PoseCell),
    Derived(DerivedCell),
}

impl Cell {
    pub fn flag(initial: bool) -> Self {
        Self::Flag(FlagCell::new(1, initial))
    }

    pub fn int(initial: i32) -> Self {
        Self::Numeric(NumericCell::int(1, initial))
    }

    pub fn long(initial: i64) -> Self {
        Self::Numeric(NumericCell::long(1, initial))
    }

    pub fn double(initial: f64) -> Self {
        Self::Numeric(NumericCell::double(1, initial))
    }

    pub fn pose() -> Self {
        Self::Pose(PoseCell::new(1))
    }

    pub fn derived(kind: ValueKind, getter: impl Fn(usize) -> StateValue + Send + Sync + 'static) -> Self {
        Self::Derived(DerivedCell::new(kind, 1, Box::new(getter)))
    }

    fn inner(&self) -> &dyn StateCell {
        match self {
            Self::Flag(c) => c,
            Self::Numeric(c) => c,
            Self::Pose(c) => c,
            Self::Derived(c) => c,
        }
    }
}

impl StateCell for Cell {
    fn len(&self) -> usize {
        self.inner().len()
    }

    fn kind(&self) -> ValueKind {
        self.inner().kind()
    }

    fn get(&self, name: &str, index: usize) -> TillerResult<StateValue> {
        self.inner().get(name, index)
    }

    fn set(&self, name: &str, index: usize, value: StateValue) -> TillerResult<Written> {
        self.inner().set(name, index, value)
    }
}
