//! Typed state values.

use crate::geo::UtmPose;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// A value read from or written to the state store.
///
/// Untagged on the wire so operator commands can write `true`, `1200` or a
/// pose object directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Pose(UtmPose),
}

/// The kind of a [`StateValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int,
    Long,
    Double,
    Pose,
}

impl StateValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Pose(_) => ValueKind::Pose,
        }
    }

    /// Numeric view of any numeric kind. Booleans and poses are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Long(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            Self::Bool(_) | Self::Pose(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            Self::Double(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_pose(&self) -> Option<UtmPose> {
        match self {
            Self::Pose(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Pose(p) => write!(f, "{}", p),
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for StateValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<UtmPose> for StateValue {
    fn from(v: UtmPose) -> Self {
        Self::Pose(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(StateValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(StateValue::Long(-7).as_f64(), Some(-7.0));
        assert_eq!(StateValue::Bool(true).as_f64(), None);
        assert_eq!(StateValue::Double(2.9).as_i64(), Some(2));
    }

    #[test]
    fn test_untagged_json() {
        let v: StateValue = serde_json::from_str("1200").unwrap();
        assert_eq!(v, StateValue::Int(1200));
        let v: StateValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(v, StateValue::Double(12.5));
        let v: StateValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, StateValue::Bool(true));
        let v: StateValue =
            serde_json::from_str(r#"{"easting": 1.0, "northing": 2.0, "zone": 17}"#).unwrap();
        assert_eq!(v.kind(), ValueKind::Pose);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ValueKind::Double.to_string(), "double");
        assert_eq!("pose".parse::<ValueKind>().unwrap(), ValueKind::Pose);
    }
}
