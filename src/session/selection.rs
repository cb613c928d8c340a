//! Selected channel

use crate::error::Result;
use crate::state::{ChannelStatus, ChannelUpdate, ParameterSet, UpdateSource};
use tracing::{info, warn};

impl super::DashboardSession {
    /// Select `name` and refetch its parameters and status
    ///
    /// Always refetches, even when `name` is already selected. On failure the
    /// selection stays changed and the store is left untouched.
    pub async fn select(&self, name: &str) -> Result<ParameterSet> {
        self.store.set_selection(name);
        info!(channel = name, "Channel selected");

        let parameters = self.load_parameters(name).await?;

        match embedded_status(&parameters) {
            Some(status) => self.store.upsert(
                name,
                ChannelUpdate::with_parameters(status, parameters.clone()),
                UpdateSource::Poll,
            ),
            None => {
                warn!(channel = name, "Parameters carry no active/lock flags, keeping status");
                self.store
                    .apply_parameters(name, parameters.clone(), UpdateSource::Poll)
                    .await?;
            }
        }

        Ok(parameters)
    }

    /// Currently selected channel
    pub async fn selection(&self) -> Option<String> {
        self.store.selection().await
    }
}

fn embedded_status(parameters: &ParameterSet) -> Option<ChannelStatus> {
    Some(ChannelStatus::new(
        parameters.embedded_flag("active")?,
        parameters.embedded_flag("lock")?,
    ))
}
