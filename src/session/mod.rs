//! DashboardSession - reconciliation of polls, streams and commands
//!
//! The session owns everything one dashboard needs:
//! - the channel store (through its actor handle)
//! - the backend used for every request and stream
//! - the named timers (status poll, plot refresh)
//! - the staged parameter edit
//!
//! Operations are split across files as `impl DashboardSession` blocks:
//! commands in `dispatcher`, selection in `selection`, parameter edits in
//! `editor`, push streams in `streams`, periodic work in `polling` and the
//! wavemeter calibration commands in `calibration`.

mod calibration;
mod dispatcher;
mod editor;
mod polling;
mod selection;
mod streams;

pub use dispatcher::{parse_piezo_input, ToggleIntent};

#[cfg(test)]
mod tests;

use crate::backend::Backend;
use crate::config::PollingConfig;
use crate::error::Result;
use crate::scheduler::{PollScheduler, STATUS_POLL};
use crate::state::{EditForm, IndicatorChange, ParameterSet, StoreHandle};
use crate::view::ViewEvent;
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Parameter set staged for editing
#[derive(Debug, Clone)]
pub(crate) struct EditSession {
    pub name: String,
    /// Last fetched (or last written) set
    pub base: ParameterSet,
    pub form: EditForm,
}

/// One dashboard session, shared as `Arc<DashboardSession>`
pub struct DashboardSession {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) store: StoreHandle,
    pub(crate) scheduler: PollScheduler,
    pub(crate) settings: Mutex<PollingConfig>,
    pub(crate) edit: Mutex<Option<EditSession>>,
    pub(crate) view_tx: mpsc::UnboundedSender<ViewEvent>,
    /// Wavemeter calibration run initialized on the server
    pub(crate) wm_initialized: AtomicBool,
    stream_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DashboardSession {
    /// Spawn the store actor and wire its notifications to the view channel
    pub async fn spawn(
        settings: PollingConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ViewEvent>)> {
        let (view_tx, view_rx) = mpsc::unbounded_channel();
        let store = StoreHandle::spawn();

        let indicator_tx = view_tx.clone();
        store
            .subscribe(Arc::new(move |change: &IndicatorChange| {
                let _ = indicator_tx.send(ViewEvent::Indicator(change.clone()));
            }))
            .await?;

        info!(backend = backend.name(), "Dashboard session created");

        let session = Arc::new(Self {
            backend,
            store,
            scheduler: PollScheduler::new(),
            settings: Mutex::new(settings),
            edit: Mutex::new(None),
            view_tx,
            wm_initialized: AtomicBool::new(false),
            stream_tasks: Mutex::new(Vec::new()),
        });

        Ok((session, view_rx))
    }

    /// Select the first channel, start polling and open both streams
    ///
    /// Only a failure to list channels is returned; everything else is logged
    /// and left to the next tick or user action.
    pub async fn initialize(self: &Arc<Self>, initial: Option<String>) -> Result<()> {
        let initial = match initial {
            Some(name) => Some(name),
            None => self.backend.fetch_channel_list().await?.into_iter().next(),
        };

        match &initial {
            Some(name) => {
                if let Err(e) = self.select(name).await {
                    warn!(channel = %name, "Initial selection failed: {}", e);
                }
            }
            None => warn!("Lock server reports no channels"),
        }

        self.poll_status().await;
        self.start_status_poll();

        if let Err(e) = self.load_calibration_settings().await {
            warn!("Could not load calibration settings: {}", e);
        }

        let table = tokio::spawn({
            let session = Arc::clone(self);
            async move { session.run_table_stream().await }
        });
        let digit = tokio::spawn({
            let session = Arc::clone(self);
            async move { session.run_digit_stream().await }
        });
        self.stream_tasks.lock().extend([table, digit]);

        info!(selected = ?initial, "Dashboard initialized");
        Ok(())
    }

    /// Apply reloaded polling settings
    pub fn apply_settings(self: &Arc<Self>, new: PollingConfig) {
        let old = std::mem::replace(&mut *self.settings.lock(), new);
        if old.status_interval_ms != new.status_interval_ms && self.scheduler.is_running(STATUS_POLL)
        {
            info!(
                old_ms = old.status_interval_ms,
                new_ms = new.status_interval_ms,
                "Restarting status poll"
            );
            self.scheduler.stop_repeating(STATUS_POLL);
            self.start_status_poll();
        }
    }

    /// Stop timers and streams and the store actor
    pub fn shutdown(&self) {
        self.scheduler.stop_all();
        for task in self.stream_tasks.lock().drain(..) {
            task.abort();
        }
        self.store.shutdown();
        info!("Dashboard session shut down");
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn settings(&self) -> PollingConfig {
        *self.settings.lock()
    }

    pub(crate) fn emit(&self, event: ViewEvent) {
        let _ = self.view_tx.send(event);
    }
}
