//! StoreHandle - Public API for the StoreActor
//!
//! Fire-and-forget methods for polls, stream events and selection changes;
//! async methods with oneshot channels for acknowledged mutations and queries.

use tokio::sync::{mpsc, oneshot};

use super::commands::StoreCommand;
use super::parameters::ParameterSet;
use super::snapshot::StreamSnapshot;
use super::store::SubscriberFn;
use super::types::{Channel, ChannelUpdate, StatusField, TableState, UpdateSource};
use crate::error::{DashboardError, Result};

/// Handle for interacting with the StoreActor
///
/// # Hot Path Methods (fire-and-forget)
/// - `upsert` - Whole-record status update
/// - `replace_table` - Newer channel-table event
/// - `set_selection` - Change the selected channel
///
/// # Acknowledged Mutations (async with response)
/// - `apply_acknowledged` - One status field after a successful command
/// - `apply_parameters` - Parameter set after a successful write or fetch
///
/// # Query Methods (async with response)
/// - `get`, `get_all`, `selection`, `table`
#[derive(Clone)]
pub struct StoreHandle {
    cmd_tx: mpsc::UnboundedSender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<StoreCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new StoreActor and return a handle
    pub fn spawn() -> Self {
        super::actor::StoreActor::spawn()
    }

    // =========================================================================
    // Hot path methods (fire-and-forget, no await)
    // =========================================================================

    /// Replace a channel's status with a polled or fetched value
    pub fn upsert(&self, name: impl Into<String>, update: ChannelUpdate, source: UpdateSource) {
        let _ = self.cmd_tx.send(StoreCommand::Upsert {
            name: name.into(),
            update,
            source,
        });
    }

    /// Replace the channel table
    pub fn replace_table(&self, snapshot: StreamSnapshot) {
        let _ = self.cmd_tx.send(StoreCommand::ReplaceTable(snapshot));
    }

    pub fn set_selection(&self, name: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(StoreCommand::SetSelection { name: name.into() });
    }

    // =========================================================================
    // Acknowledged mutations (async with response)
    // =========================================================================

    /// Apply a command's confirmed effect on one status field
    pub async fn apply_acknowledged(
        &self,
        name: &str,
        field: StatusField,
        value: bool,
        source: UpdateSource,
    ) -> Result<Channel> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = StoreCommand::ApplyAcknowledged {
            name: name.to_string(),
            field,
            value,
            source,
            response: response_tx,
        };
        self.request(cmd, response_rx).await
    }

    /// Replace a channel's parameters, keeping its status
    pub async fn apply_parameters(
        &self,
        name: &str,
        parameters: ParameterSet,
        source: UpdateSource,
    ) -> Result<Channel> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = StoreCommand::ApplyParameters {
            name: name.to_string(),
            parameters,
            source,
            response: response_tx,
        };
        self.request(cmd, response_rx).await
    }

    // =========================================================================
    // Query methods (async with response)
    // =========================================================================

    /// Record for `name`; `NotFound` if never observed
    pub async fn get(&self, name: &str) -> Result<Channel> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = StoreCommand::Get {
            name: name.to_string(),
            response: response_tx,
        };
        self.request(cmd, response_rx).await?
    }

    /// Every record in first-insertion order
    pub async fn get_all(&self) -> Vec<Channel> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(StoreCommand::GetAll {
                response: response_tx,
            })
            .is_err()
        {
            return Vec::new();
        }
        response_rx.await.ok().unwrap_or_default()
    }

    pub async fn selection(&self) -> Option<String> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(StoreCommand::GetSelection {
                response: response_tx,
            })
            .is_err()
        {
            return None;
        }
        response_rx.await.ok().flatten()
    }

    pub async fn table(&self) -> Option<TableState> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(StoreCommand::GetTable {
                response: response_tx,
            })
            .is_err()
        {
            return None;
        }
        response_rx.await.ok().flatten()
    }

    /// Register a listener called after every upsert
    pub async fn subscribe(&self, listener: SubscriberFn) -> Result<usize> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = StoreCommand::Subscribe {
            listener,
            response: response_tx,
        };
        self.request(cmd, response_rx).await
    }

    // =========================================================================
    // Lifecycle methods
    // =========================================================================

    /// Signal the actor to shut down
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(StoreCommand::Shutdown);
    }

    async fn request<T>(
        &self,
        cmd: StoreCommand,
        response_rx: oneshot::Receiver<T>,
    ) -> Result<T> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| DashboardError::transport("store actor stopped"))?;
        response_rx
            .await
            .map_err(|_| DashboardError::transport("store actor dropped the request"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::types::{ChannelStatus, IndicatorChange};
    use std::sync::Arc;

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<StoreHandle>();
    }

    #[tokio::test]
    async fn test_stopped_actor_is_transport_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = StoreHandle::new(tx);
        assert!(matches!(
            handle.get("A").await,
            Err(DashboardError::Transport(_))
        ));
        assert!(handle.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_commands_apply_in_arrival_order() {
        let handle = StoreHandle::spawn();

        handle.upsert("A", ChannelUpdate::status(true, true), UpdateSource::Poll);
        let acked = handle
            .apply_acknowledged("A", StatusField::Lock, false, UpdateSource::Command)
            .await
            .unwrap();
        assert_eq!(acked.status, ChannelStatus::new(true, false));

        // A poll that lands after the ack replaces it whole
        handle.upsert("A", ChannelUpdate::status(false, true), UpdateSource::Poll);
        let channel = handle.get("A").await.unwrap();
        assert_eq!(channel.status, ChannelStatus::new(false, true));
        assert_eq!(channel.last_updated_by, UpdateSource::Poll);
        assert!(channel.revision > acked.revision);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let handle = StoreHandle::spawn();
        assert!(matches!(
            handle.get("ghost").await,
            Err(DashboardError::NotFound(_))
        ));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_subscribe_and_selection() {
        let handle = StoreHandle::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel::<IndicatorChange>();
        handle
            .subscribe(Arc::new(move |change: &IndicatorChange| {
                let _ = tx.send(change.clone());
            }))
            .await
            .unwrap();

        handle.set_selection("A");
        handle.upsert("A", ChannelUpdate::status(true, false), UpdateSource::Poll);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.name, "A");
        assert!(change.is_selected);
        assert_eq!(handle.selection().await.as_deref(), Some("A"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_table_round_trip() {
        let handle = StoreHandle::spawn();
        assert!(handle.table().await.is_none());
        handle.replace_table(StreamSnapshot {
            reference_lock_state: Some(true),
            ..Default::default()
        });
        let table = handle.table().await.unwrap();
        assert!(table.snapshot.reference_locked());
        handle.shutdown();
    }
}
