//! ChannelStateStore - local picture of every observed channel
//!
//! Holds one record per channel name, the current selection and the latest
//! channel-table event. Every update replaces a channel's status as a whole and
//! is stamped with a store-wide revision, so the record always reflects the
//! single most recent update that reached the store. Subscribers are notified
//! synchronously after each upsert.

use super::parameters::ParameterSet;
use super::snapshot::StreamSnapshot;
use super::types::{
    Channel, ChannelStatus, ChannelUpdate, IndicatorChange, StatusField, TableState, UpdateSource,
};
use crate::error::{DashboardError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Subscriber callback invoked after every upsert
pub type SubscriberFn = Arc<dyn Fn(&IndicatorChange) + Send + Sync>;

/// Channel records, selection and table, mutated through `&mut self` only
#[derive(Default)]
pub struct ChannelStateStore {
    /// Records in first-insertion order
    channels: Vec<Channel>,
    /// name -> position in `channels`
    index: HashMap<String, usize>,
    selection: Option<String>,
    table: Option<TableState>,
    subscribers: Vec<SubscriberFn>,
    revision: u64,
}

impl ChannelStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a channel's status (and parameters, if supplied) and notify
    pub fn upsert(&mut self, name: &str, update: ChannelUpdate, source: UpdateSource) -> Channel {
        let revision = self.next_revision();
        let now = Instant::now();

        let stored = match self.index.get(name) {
            Some(&pos) => {
                let record = &mut self.channels[pos];
                record.status = update.status;
                if let Some(parameters) = update.parameters {
                    record.parameters = Some(parameters);
                }
                record.last_updated_by = source;
                record.last_updated_at = now;
                record.revision = revision;
                record.clone()
            }
            None => {
                let record = Channel {
                    name: name.to_string(),
                    status: update.status,
                    parameters: update.parameters,
                    last_updated_by: source,
                    last_updated_at: now,
                    revision,
                };
                self.index.insert(name.to_string(), self.channels.len());
                self.channels.push(record.clone());
                record
            }
        };

        trace!(
            channel = name,
            active = stored.status.active,
            lock = stored.status.lock,
            %source,
            revision,
            "Channel updated"
        );

        self.notify_subscribers(&stored);
        stored
    }

    /// Acknowledged command: set one field on top of the current record
    ///
    /// A channel never observed before starts from all-false.
    pub fn apply_acknowledged(
        &mut self,
        name: &str,
        field: StatusField,
        value: bool,
        source: UpdateSource,
    ) -> Channel {
        let current = self
            .index
            .get(name)
            .map(|&pos| self.channels[pos].status)
            .unwrap_or_default();
        let update = ChannelUpdate {
            status: current.with(field, value),
            parameters: None,
        };
        self.upsert(name, update, source)
    }

    /// Replace a channel's parameters, keeping its status
    pub fn apply_parameters(
        &mut self,
        name: &str,
        parameters: ParameterSet,
        source: UpdateSource,
    ) -> Channel {
        let status = self
            .index
            .get(name)
            .map(|&pos| self.channels[pos].status)
            .unwrap_or_else(|| {
                ChannelStatus::new(
                    parameters.embedded_flag("active").unwrap_or(false),
                    parameters.embedded_flag("lock").unwrap_or(false),
                )
            });
        self.upsert(name, ChannelUpdate::with_parameters(status, parameters), source)
    }

    /// Record for `name`
    pub fn get(&self, name: &str) -> Result<Channel> {
        self.index
            .get(name)
            .map(|&pos| self.channels[pos].clone())
            .ok_or_else(|| DashboardError::NotFound(name.to_string()))
    }

    /// Snapshot of every record in first-insertion order
    pub fn get_all(&self) -> Vec<Channel> {
        self.channels.clone()
    }

    pub fn set_selection(&mut self, name: &str) {
        trace!(channel = name, "Selection changed");
        self.selection = Some(name.to_string());
    }

    pub fn selection(&self) -> Option<String> {
        self.selection.clone()
    }

    /// Replace the table with a newer event
    pub fn replace_table(&mut self, snapshot: StreamSnapshot) {
        let revision = self.next_revision();
        self.table = Some(TableState {
            snapshot,
            last_updated_by: UpdateSource::Stream,
            last_updated_at: Instant::now(),
            revision,
        });
    }

    pub fn table(&self) -> Option<TableState> {
        self.table.clone()
    }

    /// Register a listener; returns its id
    pub fn subscribe(&mut self, listener: SubscriberFn) -> usize {
        self.subscribers.push(listener);
        self.subscribers.len() - 1
    }

    /// Number of upserts and table replacements applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn notify_subscribers(&self, channel: &Channel) {
        let change = IndicatorChange {
            name: channel.name.clone(),
            active: channel.status.active,
            lock: channel.status.lock,
            is_selected: self.selection.as_deref() == Some(channel.name.as_str()),
            source: channel.last_updated_by,
        };
        for subscriber in &self.subscribers {
            subscriber(&change);
        }
    }
}
