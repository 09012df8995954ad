//! Metric value types and their canonical text form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Wire type of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    U32,
    U64,
    Float,
    Double,
    String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Semantics {
    /// Monotonic cumulative counter.
    Counter,
    /// Point-in-time reading.
    Instant,
    /// Rarely changing value (hardware inventory, names).
    Discrete,
}

/// Physical unit of a metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    None,
    Count,
    Bytes,
    Kbytes,
    Mbytes,
    Msec,
    Usec,
    Sec,
    /// Events per second (`kernel.all.hz`).
    CountPerSec,
    /// Frequency (`hinv.cpu.clock`).
    PerUsec,
}

impl Unit {
    /// Dimensions as `(space, time, count)` exponents.
    pub const fn dims(self) -> (i8, i8, i8) {
        match self {
            Unit::None => (0, 0, 0),
            Unit::Count => (0, 0, 1),
            Unit::Bytes | Unit::Kbytes | Unit::Mbytes => (1, 0, 0),
            Unit::Msec | Unit::Usec | Unit::Sec => (0, 1, 0),
            Unit::CountPerSec => (0, -1, 1),
            Unit::PerUsec => (0, -1, 0),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Count => "count",
            Unit::Bytes => "byte",
            Unit::Kbytes => "Kbyte",
            Unit::Mbytes => "Mbyte",
            Unit::Msec => "millisec",
            Unit::Usec => "microsec",
            Unit::Sec => "sec",
            Unit::CountPerSec => "count / sec",
            Unit::PerUsec => "/ microsec",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// MetricValue
// ---------------------------------------------------------------------------

/// A single decoded metric value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    U32(u32),
    U64(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl MetricValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            MetricValue::U32(_) => ValueType::U32,
            MetricValue::U64(_) => ValueType::U64,
            MetricValue::Float(_) => ValueType::Float,
            MetricValue::Double(_) => ValueType::Double,
            MetricValue::String(_) => ValueType::String,
        }
    }

    /// Canonical text form handed to the metric store.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// value, so no precision is lost.
    pub fn to_text(&self) -> String {
        match self {
            MetricValue::U32(v) => v.to_string(),
            MetricValue::U64(v) => v.to_string(),
            MetricValue::Float(v) => v.to_string(),
            MetricValue::Double(v) => v.to_string(),
            MetricValue::String(s) => s.clone(),
        }
    }

    /// Parses `text` as `value_type`.
    pub fn parse(value_type: ValueType, text: &str) -> Result<Self, ValueError> {
        let err = || ValueError::Parse {
            value_type,
            text: text.to_string(),
        };
        let parsed = match value_type {
            ValueType::U32 => MetricValue::U32(text.trim().parse().map_err(|_| err())?),
            ValueType::U64 => MetricValue::U64(text.trim().parse().map_err(|_| err())?),
            ValueType::Float => MetricValue::Float(text.trim().parse().map_err(|_| err())?),
            ValueType::Double => MetricValue::Double(text.trim().parse().map_err(|_| err())?),
            ValueType::String => MetricValue::String(text.to_string()),
        };
        Ok(parsed)
    }

    // ---- Coercions used by group readers ----

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetricValue::U32(v) => Some(u64::from(*v)),
            MetricValue::U64(v) => Some(*v),
            MetricValue::Float(v) => float_to_u64(f64::from(*v)),
            MetricValue::Double(v) => float_to_u64(*v),
            MetricValue::String(_) => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::U32(v) => Some(f64::from(*v)),
            MetricValue::U64(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(f64::from(*v)),
            MetricValue::Double(v) => Some(*v),
            MetricValue::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(s) => Some(s),
            _ => None,
        }
    }
}

fn float_to_u64(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0).then_some(v as u64)
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
