//! Command enum for the store actor
//!
//! Hot-path updates are fire-and-forget; queries and acknowledged mutations
//! carry a oneshot channel for the answer.

use super::parameters::ParameterSet;
use super::snapshot::StreamSnapshot;
use super::store::SubscriberFn;
use super::types::{Channel, ChannelUpdate, StatusField, TableState, UpdateSource};
use crate::error::Result;
use tokio::sync::oneshot;

/// Commands processed by the StoreActor, one at a time
pub enum StoreCommand {
    // -------------------------------------------------------------------------
    // Hot path (no response)
    // -------------------------------------------------------------------------
    /// Whole-record status update from a poll or fetch
    Upsert {
        name: String,
        update: ChannelUpdate,
        source: UpdateSource,
    },

    /// Replace the channel table with a newer push event
    ReplaceTable(StreamSnapshot),

    /// Change the selected channel
    SetSelection { name: String },

    // -------------------------------------------------------------------------
    // Mutations answered with the resulting record
    // -------------------------------------------------------------------------
    /// Acknowledged command effect on one status field
    ApplyAcknowledged {
        name: String,
        field: StatusField,
        value: bool,
        source: UpdateSource,
        response: oneshot::Sender<Channel>,
    },

    /// Acknowledged parameter write
    ApplyParameters {
        name: String,
        parameters: ParameterSet,
        source: UpdateSource,
        response: oneshot::Sender<Channel>,
    },

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------
    Get {
        name: String,
        response: oneshot::Sender<Result<Channel>>,
    },

    GetAll {
        response: oneshot::Sender<Vec<Channel>>,
    },

    GetSelection {
        response: oneshot::Sender<Option<String>>,
    },

    GetTable {
        response: oneshot::Sender<Option<TableState>>,
    },

    Subscribe {
        listener: SubscriberFn,
        response: oneshot::Sender<usize>,
    },

    /// Stop the actor loop
    Shutdown,
}

// Manual Debug implementation because SubscriberFn doesn't implement Debug
impl std::fmt::Debug for StoreCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreCommand::Upsert {
                name,
                update,
                source,
            } => f
                .debug_struct("Upsert")
                .field("name", name)
                .field("status", &update.status)
                .field("with_parameters", &update.parameters.is_some())
                .field("source", source)
                .finish(),
            StoreCommand::ReplaceTable(snapshot) => f
                .debug_struct("ReplaceTable")
                .field("rows", &snapshot.active_frequencies.len())
                .finish(),
            StoreCommand::SetSelection { name } => {
                f.debug_struct("SetSelection").field("name", name).finish()
            }
            StoreCommand::ApplyAcknowledged {
                name, field, value, ..
            } => f
                .debug_struct("ApplyAcknowledged")
                .field("name", name)
                .field("field", field)
                .field("value", value)
                .finish_non_exhaustive(),
            StoreCommand::ApplyParameters { name, .. } => f
                .debug_struct("ApplyParameters")
                .field("name", name)
                .finish_non_exhaustive(),
            StoreCommand::Get { name, .. } => f
                .debug_struct("Get")
                .field("name", name)
                .finish_non_exhaustive(),
            StoreCommand::GetAll { .. } => write!(f, "GetAll"),
            StoreCommand::GetSelection { .. } => write!(f, "GetSelection"),
            StoreCommand::GetTable { .. } => write!(f, "GetTable"),
            StoreCommand::Subscribe { .. } => f.debug_struct("Subscribe").finish_non_exhaustive(),
            StoreCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
