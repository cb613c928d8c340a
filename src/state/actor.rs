//! StoreActor - serializes every store mutation through one task
//!
//! The actor owns the [`ChannelStateStore`] and processes [`StoreCommand`]s
//! sequentially. Each command runs to completion before the next one starts,
//! so a poll, a stream event and a command acknowledgment can never interleave
//! inside a single mutation. Whichever reaches the actor last wins.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 StoreActor                   │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ ChannelStateStore                      │  │
//! │  │   channels / selection / table         │  │
//! │  │   subscribers                          │  │
//! │  └────────────────────────────────────────┘  │
//! │                    ▲ commands                │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ command_rx (UnboundedReceiver)         │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

use super::actor_handle::StoreHandle;
use super::commands::StoreCommand;
use super::store::ChannelStateStore;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Actor responsible for the channel store
pub struct StoreActor {
    store: ChannelStateStore,
    command_rx: mpsc::UnboundedReceiver<StoreCommand>,
}

impl StoreActor {
    /// Spawn the actor loop and return a handle to it
    pub fn spawn() -> StoreHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = StoreActor {
            store: ChannelStateStore::new(),
            command_rx: cmd_rx,
        };

        tokio::spawn(actor.run());

        info!("StoreActor spawned");

        StoreHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        debug!("StoreActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                StoreCommand::Upsert {
                    name,
                    update,
                    source,
                } => {
                    self.store.upsert(&name, update, source);
                }
                StoreCommand::ReplaceTable(snapshot) => {
                    self.store.replace_table(snapshot);
                }
                StoreCommand::SetSelection { name } => {
                    self.store.set_selection(&name);
                }
                StoreCommand::ApplyAcknowledged {
                    name,
                    field,
                    value,
                    source,
                    response,
                } => {
                    let channel = self.store.apply_acknowledged(&name, field, value, source);
                    let _ = response.send(channel);
                }
                StoreCommand::ApplyParameters {
                    name,
                    parameters,
                    source,
                    response,
                } => {
                    let channel = self.store.apply_parameters(&name, parameters, source);
                    let _ = response.send(channel);
                }
                StoreCommand::Get { name, response } => {
                    let _ = response.send(self.store.get(&name));
                }
                StoreCommand::GetAll { response } => {
                    let _ = response.send(self.store.get_all());
                }
                StoreCommand::GetSelection { response } => {
                    let _ = response.send(self.store.selection());
                }
                StoreCommand::GetTable { response } => {
                    let _ = response.send(self.store.table());
                }
                StoreCommand::Subscribe { listener, response } => {
                    let id = self.store.subscribe(listener);
                    let _ = response.send(id);
                    debug!(subscriber_id = id, "Added subscriber");
                }
                StoreCommand::Shutdown => {
                    info!("StoreActor received shutdown command");
                    break;
                }
            }
        }

        info!(
            revision = self.store.revision(),
            "StoreActor run loop terminated"
        );
    }
}
