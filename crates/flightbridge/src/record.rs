//! Telemetry records and control inputs.
//!
//! Both halves of the relay's data model are single JSON object lines: the
//! pipeline (and the synthetic generator) emit [`TelemetryRecord`]s, and in
//! interactive mode connected control panels submit [`ControlInput`]s that
//! are forwarded to the pipeline's standard input.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// First character of a well-formed record line on the pipeline's stdout.
pub const RECORD_START: char = '{';

/// One structured snapshot of computed flight/sensor state.
///
/// A record is an ordered mapping of named numeric/boolean fields (the field
/// set is fixed by the pipeline's contract, not by this crate). Records are
/// immutable once produced; a new record fully replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    fields: Map<String, Value>,
}

impl TelemetryRecord {
    /// Parse one line of pipeline output into a record.
    ///
    /// Returns `None` for anything that is not a JSON object line starting
    /// with [`RECORD_START`] (status text, partial writes, blank lines).
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(RECORD_START) {
            return None;
        }
        let value: Value = serde_json::from_str(line).ok()?;
        Self::from_value(value)
    }

    /// Build a record from an already-parsed JSON value.
    ///
    /// Returns `None` unless the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Serialize the record as a single newline-free JSON line.
    #[must_use]
    pub fn to_line(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// Look up a numeric field by its wire name (e.g. `"AOA"`).
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// Check whether the record carries the given field.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the record carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

/// One structured snapshot of raw sensor and state values for the pipeline.
///
/// All fields are optional; the pipeline tolerates partial input (including
/// direct `AOA` injection, which arrives through `extra`). Unknown keys are
/// preserved and forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    /// Forward (pitot) pressure in Pa.
    #[serde(rename = "Pfwd", default, skip_serializing_if = "Option::is_none")]
    pub p_fwd: Option<f64>,

    /// 45-degree port pressure in Pa.
    #[serde(rename = "P45", default, skip_serializing_if = "Option::is_none")]
    pub p_45: Option<f64>,

    /// Indicated airspeed in knots.
    #[serde(rename = "IAS", default, skip_serializing_if = "Option::is_none")]
    pub ias: Option<f64>,

    /// Pressure altitude in feet.
    #[serde(rename = "Palt", default, skip_serializing_if = "Option::is_none")]
    pub pressure_alt: Option<f64>,

    /// Pitch angle in degrees.
    #[serde(rename = "Pitch", default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,

    /// Roll angle in degrees.
    #[serde(rename = "Roll", default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,

    /// Vertical load factor in g.
    #[serde(rename = "VerticalG", default, skip_serializing_if = "Option::is_none")]
    pub vertical_g: Option<f64>,

    /// Lateral load factor in g.
    #[serde(rename = "LateralG", default, skip_serializing_if = "Option::is_none")]
    pub lateral_g: Option<f64>,

    /// Flight path angle in degrees.
    #[serde(rename = "FlightPath", default, skip_serializing_if = "Option::is_none")]
    pub flight_path: Option<f64>,

    /// Flap position in degrees.
    #[serde(rename = "flapsPos", default, skip_serializing_if = "Option::is_none")]
    pub flaps_pos: Option<i64>,

    /// Any additional fields, forwarded to the pipeline untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ControlInput {
    /// Parse one client message into a control input.
    ///
    /// Returns `None` for messages that are not well-formed JSON object
    /// lines; such messages are ignored by the caller, never fatal.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with(RECORD_START) {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Serialize as a single JSON line for the pipeline's stdin.
    #[must_use]
    pub fn to_line(&self) -> String {
        // Serialization of this type cannot fail; the fallback is unreachable.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl fmt::Display for ControlInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}
