//! Tunable parameter set of a channel and the edit form bound to it

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Default wavemeter reading state reported by the server
pub const DEFAULT_READING_STATE: &str = "WM Readout Working";

/// Full parameter set as served by `get/parameter`
///
/// Keys the dashboard does not interpret (`active`, `lock`, `type`, trace
/// settings, ...) are kept in `extra` so a write sends the complete object back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub setpoint: f64,
    pub offset: f64,
    #[serde(rename = "P")]
    pub p: f64,
    #[serde(rename = "I")]
    pub i: f64,
    #[serde(rename = "D")]
    pub d: f64,
    /// `null` on the wire when the channel config holds 0 (unset)
    #[serde(default)]
    pub range_center: Option<f64>,
    #[serde(default)]
    pub range_span: Option<f64>,
    /// `null` on the wire when ramping is disabled
    #[serde(default)]
    pub ramp_rate: Option<f64>,
    #[serde(rename = "WM_Exposure", default)]
    pub exposure: f64,
    /// `[lower, upper]`, each `null` when unset; lower <= upper when both set
    #[serde(default)]
    pub limits: [Option<f64>; 2],
    #[serde(rename = "WM_Reading_State", default)]
    pub reading_state: ReadingState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParameterSet {
    /// Lock/active flags the server embeds in the parameter object
    pub fn embedded_flag(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }

    /// Check the limits ordering
    pub fn validate(&self) -> Result<()> {
        check_limits(self.limits[0], self.limits[1])
    }
}

/// Display-only wavemeter state, either a number or a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingState {
    Number(f64),
    Text(String),
}

impl Default for ReadingState {
    fn default() -> Self {
        ReadingState::Text(DEFAULT_READING_STATE.to_string())
    }
}

impl std::fmt::Display for ReadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingState::Number(n) => write!(f, "{}", n),
            ReadingState::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Name of one edit field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    Setpoint,
    Offset,
    P,
    I,
    D,
    RangeCenter,
    RangeSpan,
    LowerLimit,
    UpperLimit,
    RampRate,
    Exposure,
}

impl EditField {
    pub fn all() -> &'static [EditField] {
        &[
            EditField::Setpoint,
            EditField::Offset,
            EditField::P,
            EditField::I,
            EditField::D,
            EditField::RangeCenter,
            EditField::RangeSpan,
            EditField::LowerLimit,
            EditField::UpperLimit,
            EditField::RampRate,
            EditField::Exposure,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditField::Setpoint => "setpoint",
            EditField::Offset => "offset",
            EditField::P => "p",
            EditField::I => "i",
            EditField::D => "d",
            EditField::RangeCenter => "center",
            EditField::RangeSpan => "span",
            EditField::LowerLimit => "lower",
            EditField::UpperLimit => "upper",
            EditField::RampRate => "ramp_rate",
            EditField::Exposure => "exposure",
        }
    }
}

impl FromStr for EditField {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "range_center" => return Ok(EditField::RangeCenter),
            "range_span" => return Ok(EditField::RangeSpan),
            "wm_exposure" => return Ok(EditField::Exposure),
            _ => {}
        }
        EditField::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| DashboardError::InvalidInput(format!("unknown parameter '{}'", s)))
    }
}

impl std::fmt::Display for EditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Values visible in the edit fields
///
/// A commit writes every one of these over the staged parameter set, whether
/// or not it was touched.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    pub setpoint: f64,
    pub offset: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub range_center: Option<f64>,
    pub range_span: Option<f64>,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
    pub ramp_rate: Option<f64>,
    pub exposure: f64,
}

impl EditForm {
    /// Populate the form from a fetched set
    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self {
            setpoint: params.setpoint,
            offset: params.offset,
            p: params.p,
            i: params.i,
            d: params.d,
            range_center: params.range_center,
            range_span: params.range_span,
            lower_limit: params.limits[0],
            upper_limit: params.limits[1],
            ramp_rate: params.ramp_rate,
            exposure: params.exposure,
        }
    }

    /// Overwrite one field
    pub fn set(&mut self, field: EditField, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(DashboardError::InvalidInput(format!(
                "{} must be a finite number",
                field
            )));
        }
        match field {
            EditField::Setpoint => self.setpoint = value,
            EditField::Offset => self.offset = value,
            EditField::P => self.p = value,
            EditField::I => self.i = value,
            EditField::D => self.d = value,
            EditField::RangeCenter => self.range_center = Some(value),
            EditField::RangeSpan => self.range_span = Some(value),
            EditField::LowerLimit => self.lower_limit = Some(value),
            EditField::UpperLimit => self.upper_limit = Some(value),
            EditField::RampRate => self.ramp_rate = Some(value),
            EditField::Exposure => self.exposure = value,
        }
        Ok(())
    }

    /// Read one field (`None` when unset on the server)
    pub fn get(&self, field: EditField) -> Option<f64> {
        match field {
            EditField::Setpoint => Some(self.setpoint),
            EditField::Offset => Some(self.offset),
            EditField::P => Some(self.p),
            EditField::I => Some(self.i),
            EditField::D => Some(self.d),
            EditField::RangeCenter => self.range_center,
            EditField::RangeSpan => self.range_span,
            EditField::LowerLimit => self.lower_limit,
            EditField::UpperLimit => self.upper_limit,
            EditField::RampRate => self.ramp_rate,
            EditField::Exposure => Some(self.exposure),
        }
    }

    /// Reject non-finite values and inverted limits
    pub fn validate(&self) -> Result<()> {
        for field in EditField::all() {
            if let Some(value) = self.get(*field) {
                if !value.is_finite() {
                    return Err(DashboardError::InvalidInput(format!(
                        "{} must be a finite number",
                        field
                    )));
                }
            }
        }
        check_limits(self.lower_limit, self.upper_limit)
    }

    /// Complete parameter set: `base` with every form field written over it
    pub fn apply_to(&self, base: &ParameterSet) -> ParameterSet {
        ParameterSet {
            setpoint: self.setpoint,
            offset: self.offset,
            p: self.p,
            i: self.i,
            d: self.d,
            range_center: self.range_center,
            range_span: self.range_span,
            ramp_rate: self.ramp_rate,
            exposure: self.exposure,
            limits: [self.lower_limit, self.upper_limit],
            reading_state: base.reading_state.clone(),
            extra: base.extra.clone(),
        }
    }
}

/// Ordered limits; unset bounds are not compared
fn check_limits(lower: Option<f64>, upper: Option<f64>) -> Result<()> {
    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower > upper {
            return Err(DashboardError::InvalidInput(format!(
                "lower limit {} exceeds upper limit {}",
                lower, upper
            )));
        }
    }
    Ok(())
}
