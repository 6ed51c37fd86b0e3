//! Live values handed to scripts.
//!
//! A [`LiveValue`] is the already-resolved snapshot of one named input at
//! trigger time: the value itself, its timestamp and an alarm-style
//! [`Quality`]. The subscription layer that produces them is external.
//!
//! The accessor helpers follow what script authors expect from a process
//! variable: numbers read as numbers, enums read as their label, arrays
//! read element-wise.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;

/// Timestamp format used by [`LiveValue::time_string`].
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Alarm-severity style quality of a live value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Good,
    Minor,
    Major,
    Invalid,
    /// No value has been received, or the source went away.
    Disconnected,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Invalid => "invalid",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Snapshot of one named live value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveValue {
    /// Source name, e.g. `"loc://x"` or a process variable name.
    pub name: String,
    pub value: Value,
    pub timestamp: Timestamp,
    pub quality: Quality,
}

impl LiveValue {
    /// A good-quality value stamped with the current time.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp: Utc::now(),
            quality: Quality::Good,
        }
    }

    /// Placeholder for an input that has no value yet.
    pub fn disconnected(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            timestamp: Utc::now(),
            quality: Quality::Disconnected,
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.quality != Quality::Disconnected
    }

    /// Numeric reading of the value.
    ///
    /// Booleans read as `0`/`1`, numeric strings are parsed, enums read as
    /// their index and arrays as their first element.
    pub fn as_f64(&self) -> Option<f64> {
        numeric(&self.value)
    }

    /// Integer reading of the value; fractional numbers are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => self.as_f64().map(|f| f as i64),
        }
    }

    /// Text reading of the value.
    ///
    /// Enums read as their current label, arrays as `[a, b, c]`, a missing
    /// value as the empty string.
    pub fn as_string(&self) -> String {
        text(&self.value)
    }

    /// Array reading of the value; a scalar becomes a one-element array.
    pub fn as_f64_array(&self) -> Vec<f64> {
        match &self.value {
            Value::Array(items) => items.iter().filter_map(numeric).collect(),
            other => numeric(other).into_iter().collect(),
        }
    }

    /// Labels of an enumerated value, `None` for any other kind of value.
    pub fn labels(&self) -> Option<Vec<String>> {
        enum_parts(&self.value).map(|(_, labels)| {
            labels
                .iter()
                .map(|l| l.as_str().map(str::to_string).unwrap_or_else(|| l.to_string()))
                .collect()
        })
    }

    pub fn time_string(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }
}

/// Split an enum value `{"index": n, "labels": [...]}` into its parts.
fn enum_parts(value: &Value) -> Option<(i64, &Vec<Value>)> {
    let obj = value.as_object()?;
    let index = obj.get("index")?.as_i64()?;
    let labels = obj.get("labels")?.as_array()?;
    Some((index, labels))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) => items.first().and_then(numeric),
        Value::Object(_) => enum_parts(value).map(|(index, _)| index as f64),
        Value::Null => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(text).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(_) => match enum_parts(value) {
            Some((index, labels)) => usize::try_from(index)
                .ok()
                .and_then(|i| labels.get(i))
                .map(text)
                .unwrap_or_else(|| index.to_string()),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
