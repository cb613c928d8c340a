//! Channel-table push events
//!
//! Each `/stream/values` event is a complete picture of the table; nothing is
//! diffed against the previous one.

use crate::error::{DashboardError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Frequency cell of the table
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Number(f64),
    /// Anything else the server sent, shown verbatim
    Other(String),
}

impl Reading {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(Reading::Number)
                .unwrap_or_else(|| Reading::Other(n.to_string())),
            Value::String(s) => Reading::Other(s.clone()),
            other => Reading::Other(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Number(n) => Some(*n),
            Reading::Other(_) => None,
        }
    }
}

/// Point-in-time table event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSnapshot {
    /// Frequencies of active channels, in server order
    pub active_frequencies: Vec<(String, Reading)>,
    /// Piezo voltages by channel
    pub piezo_voltages: Vec<(String, f64)>,
    /// Reading of the 650 nm reference laser
    pub freq_650: Option<f64>,
    pub reference_lock_state: Option<bool>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    active_values: Option<Map<String, Value>>,
    #[serde(default)]
    piezo_values: Option<Map<String, Value>>,
    #[serde(default)]
    freq_650_value: Option<Value>,
    #[serde(default)]
    reference_lock_state: Option<Value>,
}

impl StreamSnapshot {
    /// Parse one event payload
    pub fn parse(payload: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(payload)
            .map_err(|e| DashboardError::StreamParse(format!("{}: {}", e, payload)))?;

        let active_frequencies = raw
            .active_values
            .unwrap_or_default()
            .iter()
            .map(|(name, value)| (name.clone(), Reading::from_value(value)))
            .collect();

        let piezo_voltages = raw
            .piezo_values
            .unwrap_or_default()
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.clone(), v)))
            .collect();

        Ok(Self {
            active_frequencies,
            piezo_voltages,
            freq_650: raw.freq_650_value.as_ref().and_then(Value::as_f64),
            reference_lock_state: raw.reference_lock_state.as_ref().and_then(Value::as_bool),
        })
    }

    /// Piezo voltage for a channel, if reported
    pub fn piezo(&self, name: &str) -> Option<f64> {
        self.piezo_voltages
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Reference laser is locked only on an explicit `true`
    pub fn reference_locked(&self) -> bool {
        self.reference_lock_state == Some(true)
    }
}

/// Parse one `/stream/digit` payload; `Ok(None)` for a JSON `null`
pub fn parse_digit(payload: &str) -> Result<Option<f64>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| DashboardError::StreamParse(format!("{}: {}", e, payload)))?;
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| DashboardError::StreamParse(format!("not a number: {}", s))),
        other => Err(DashboardError::StreamParse(format!(
            "unexpected digit payload: {}",
            other
        ))),
    }
}
