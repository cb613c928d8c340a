//! Error taxonomy of the reconciliation core
//!
//! Every failure here is local and recoverable: the next user action or the
//! next poll/stream tick is the retry. Application-level code (config, REPL,
//! startup) wraps these in `anyhow` like the rest of the binary.

use crate::backend::CommandKind;
use thiserror::Error;

/// Errors surfaced by the dashboard core
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Network or decode failure on a one-shot request. Store left unchanged.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed push event. Dropped; the stream stays open.
    #[error("malformed stream event: {0}")]
    StreamParse(String),

    /// Backend answered `status=false`. Store left unchanged.
    #[error("{kind} rejected for '{name}': {reason}")]
    CommandRejected {
        kind: CommandKind,
        name: String,
        reason: String,
    },

    /// Bad user input detected before any network call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Channel has never been observed
    #[error("channel '{0}' not found")]
    NotFound(String),
}

impl DashboardError {
    /// Wrap any displayable transport error
    pub fn transport(err: impl std::fmt::Display) -> Self {
        DashboardError::Transport(err.to_string())
    }

    /// Short reason string used for view notifications
    pub fn reason(&self) -> String {
        match self {
            DashboardError::CommandRejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Result alias for the core
pub type Result<T> = std::result::Result<T, DashboardError>;
