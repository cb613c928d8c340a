//! Channel state type definitions
//!
//! Defines the records held by the ChannelStateStore and the notifications it
//! publishes.

use super::parameters::ParameterSet;
use super::snapshot::StreamSnapshot;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lock/active pair of a channel, always replaced as a whole
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// Channel output enabled
    pub active: bool,
    /// Feedback control engaged
    pub lock: bool,
}

impl ChannelStatus {
    pub fn new(active: bool, lock: bool) -> Self {
        Self { active, lock }
    }

    /// Read one field
    pub fn get(&self, field: StatusField) -> bool {
        match field {
            StatusField::Active => self.active,
            StatusField::Lock => self.lock,
        }
    }

    /// Copy with one field replaced
    pub fn with(self, field: StatusField, value: bool) -> Self {
        match field {
            StatusField::Active => Self {
                active: value,
                ..self
            },
            StatusField::Lock => Self {
                lock: value,
                ..self
            },
        }
    }
}

/// Which of the two booleans a command acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Active,
    Lock,
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusField::Active => write!(f, "active"),
            StatusField::Lock => write!(f, "lock"),
        }
    }
}

/// Origin of an update applied to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    /// Periodic status poll or explicit fetch
    Poll,
    /// Server-pushed event
    Stream,
    /// Acknowledged user command
    Command,
}

impl std::fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateSource::Poll => write!(f, "poll"),
            UpdateSource::Stream => write!(f, "stream"),
            UpdateSource::Command => write!(f, "command"),
        }
    }
}

/// One channel record
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Stable key, never reused for another physical channel
    pub name: String,
    pub status: ChannelStatus,
    /// Present once a full parameter fetch has been applied
    pub parameters: Option<ParameterSet>,
    pub last_updated_by: UpdateSource,
    /// Monotonic arrival time at the store
    pub last_updated_at: Instant,
    /// Store-wide arrival counter; strictly increasing across all upserts
    pub revision: u64,
}

/// Payload of an upsert: the whole status plus optional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelUpdate {
    pub status: ChannelStatus,
    pub parameters: Option<ParameterSet>,
}

impl ChannelUpdate {
    /// Status-only update (poll)
    pub fn status(active: bool, lock: bool) -> Self {
        Self {
            status: ChannelStatus::new(active, lock),
            parameters: None,
        }
    }

    /// Status plus full parameter set (explicit fetch)
    pub fn with_parameters(status: ChannelStatus, parameters: ParameterSet) -> Self {
        Self {
            status,
            parameters: Some(parameters),
        }
    }
}

/// Notification published after every successful upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorChange {
    pub name: String,
    pub active: bool,
    pub lock: bool,
    /// True when `name` was the selected channel at the moment of the upsert
    pub is_selected: bool,
    pub source: UpdateSource,
}

/// Latest channel-table event as held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    pub snapshot: StreamSnapshot,
    pub last_updated_by: UpdateSource,
    pub last_updated_at: Instant,
    pub revision: u64,
}
