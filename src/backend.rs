//! Lock server backend (HTTP requests plus SSE streams)

pub mod http;
pub mod sse;

pub use http::HttpBackend;

use crate::error::Result;
use crate::state::{ChannelStatus, ParameterSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;
use tokio_stream::Stream;

/// Status of every reported channel, in server order
pub type StatusMap = Vec<(String, ChannelStatus)>;

/// Raw payloads of one server-pushed stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_status(&self, name: Option<&str>) -> Result<StatusMap>;
    async fn fetch_parameters(&self, name: &str) -> Result<ParameterSet>;
    async fn fetch_plot(&self, name: &str) -> Result<String>;
    async fn fetch_channel_list(&self) -> Result<Vec<String>>;
    async fn fetch_calibration_settings(&self) -> Result<CalibrationSettings>;
    async fn send_command(&self, command: Command) -> Result<CommandResult>;
    async fn subscribe_channel_table(&self) -> Result<EventStream>;
    async fn subscribe_digit_value(&self) -> Result<EventStream>;
}

/// Remote operations that mutate server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Lock,
    Unlock,
    Activate,
    Deactivate,
    SetPiezo,
    WriteParameters,
    ClearTrace,
    CalibrationSettings,
    WmInitialize,
    WmAbort,
    WmCalibrate,
}

impl CommandKind {
    /// Endpoint below `/post/`
    pub fn path(&self) -> &'static str {
        match self {
            CommandKind::Lock => "lock",
            CommandKind::Unlock => "unlock",
            CommandKind::Activate => "activate",
            CommandKind::Deactivate => "deactivate",
            CommandKind::SetPiezo => "set_piezo",
            CommandKind::WriteParameters => "parameter",
            CommandKind::ClearTrace => "trace/clear",
            CommandKind::CalibrationSettings => "calibration_settings",
            CommandKind::WmInitialize => "wm_initialize",
            CommandKind::WmAbort => "wm_abort",
            CommandKind::WmCalibrate => "wm_calibrate",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CommandKind::WriteParameters => "write_parameters",
            CommandKind::ClearTrace => "clear_trace",
            other => other.path(),
        };
        f.write_str(s)
    }
}

/// One outgoing command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// Target channel; `None` for server-wide commands
    pub name: Option<String>,
    /// Extra body fields merged next to `name`
    pub payload: Map<String, Value>,
}

impl Command {
    /// Command acting on one channel
    pub fn channel(kind: CommandKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            payload: Map::new(),
        }
    }

    /// Server-wide command
    pub fn global(kind: CommandKind) -> Self {
        Self {
            kind,
            name: None,
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// JSON body: `{name, ...payload}`
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(name) = &self.name {
            body.insert("name".to_string(), Value::String(name.clone()));
        }
        for (key, value) in &self.payload {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    /// Channel name for error reporting
    pub fn target(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Response envelope of every non-stream request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResult {
    pub status: bool,
    #[serde(default)]
    pub data: Value,
}

impl CommandResult {
    /// Human-readable rejection reason carried in `data`
    pub fn reason(&self) -> String {
        match &self.data {
            Value::Null => "no reason given".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Wavemeter auto-calibration settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    pub wm_calibration_frequency: f64,
    pub wm_calibration_interval: i64,
}
