//! Condition trees evaluated against live state.

use crate::error::{TillerError, TillerResult};
use crate::geo::UtmPose;
use crate::state::names;
use crate::state::StateSource;
use std::fmt;
use strum::{Display, EnumString};
use tracing::warn;

/// Numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CompareOp {
    #[strum(serialize = "=", to_string = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl CompareOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
        }
    }
}

/// A boolean function of the current state.
///
/// Leaves reference state by name and re-read it on every evaluation.
/// `And` and `Or` short-circuit: the right side is not read when the left
/// side already decides the result.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Const(bool),
    /// `name op value`, with any numeric kind accepted on the state side.
    Compare {
        name: String,
        op: CompareOp,
        value: f64,
    },
    /// A boolean entry read as-is.
    Flag { name: String },
    /// True while the current pose is strictly within `radius` metres of `target`.
    Near { target: UtmPose, radius: f64 },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn compare(name: impl Into<String>, op: CompareOp, value: f64) -> Self {
        Self::Compare {
            name: name.into(),
            op,
            value,
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::Flag { name: name.into() }
    }

    /// Inclusive interval membership, `low <= name <= high`.
    pub fn interval(name: impl Into<String>, low: f64, high: f64) -> Self {
        let name = name.into();
        Self::compare(name.clone(), CompareOp::Ge, low).and(Self::compare(name, CompareOp::Le, high))
    }

    /// Proximity to a fixed projected target.
    pub fn near(target: UtmPose, radius: f64) -> Self {
        Self::Near { target, radius }
    }

    /// Proximity to a fixed geodetic target, projected once here.
    pub fn near_lat_lon(lat: f64, lon: f64, radius: f64) -> Self {
        Self::near(UtmPose::from_lat_lon(lat, lon), radius)
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against the current state.
    ///
    /// A leaf whose state read fails evaluates to false and logs a warning.
    pub fn evaluate(&self, state: &dyn StateSource) -> bool {
        match self {
            Self::Const(v) => *v,
            Self::Not(inner) => !inner.evaluate(state),
            Self::And(left, right) => left.evaluate(state) && right.evaluate(state),
            Self::Or(left, right) => left.evaluate(state) || right.evaluate(state),
            leaf => match leaf.evaluate_leaf(state) {
                Ok(v) => v,
                Err(e) => {
                    warn!(condition = %leaf, error = %e, "Condition evaluated to false");
                    false
                }
            },
        }
    }

    fn evaluate_leaf(&self, state: &dyn StateSource) -> TillerResult<bool> {
        match self {
            Self::Compare { name, op, value } => {
                let current = state.read(name, 0)?;
                let number = current.as_f64().ok_or_else(|| {
                    TillerError::kind_mismatch(name.as_str(), "number", current.kind().to_string())
                })?;
                Ok(op.apply(number, *value))
            }
            Self::Flag { name } => {
                let current = state.read(name, 0)?;
                current.as_bool().ok_or_else(|| {
                    TillerError::kind_mismatch(name.as_str(), "bool", current.kind().to_string())
                })
            }
            Self::Near { target, radius } => {
                let pose = state.current_pose()?;
                Ok(pose.distance_to(target) < *radius)
            }
            _ => Err(TillerError::internal("not a leaf condition")),
        }
    }

    /// Names of every state entry this condition reads.
    pub fn referenced_states(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_states(&mut out);
        out.dedup();
        out
    }

    fn collect_states<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Const(_) => {}
            Self::Compare { name, .. } | Self::Flag { name } => out.push(name.as_str()),
            Self::Near { .. } => out.push(names::CURRENT_POSE),
            Self::Not(inner) => inner.collect_states(out),
            Self::And(l, r) | Self::Or(l, r) => {
                l.collect_states(out);
                r.collect_states(out);
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(v) => write!(f, "{}", v),
            Self::Compare { name, op, value } => write!(f, "{} {} {}", name, op, value),
            Self::Flag { name } => write!(f, "{}", name),
            Self::Near { target, radius } => write!(f, "near({}, {}m)", target, radius),
            Self::Not(inner) => write!(f, "^({})", inner),
            Self::And(l, r) => write!(f, "({} & {})", l, r),
            Self::Or(l, r) => write!(f, "({} | {})", l, r),
        }
    }
}
