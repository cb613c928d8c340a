//! Periodic status poll and plot refresh

use super::DashboardSession;
use crate::backend::{Command, CommandKind};
use crate::error::{DashboardError, Result};
use crate::scheduler::{TimerAction, PLOT_REFRESH, STATUS_POLL};
use crate::state::{ChannelUpdate, UpdateSource};
use crate::view::ViewEvent;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

impl DashboardSession {
    /// Fetch every channel's status and upsert it
    ///
    /// Failures are logged only; the next tick is the retry.
    pub async fn poll_status(&self) {
        match self.backend.fetch_status(None).await {
            Ok(statuses) => {
                debug!(channels = statuses.len(), "Status poll");
                for (name, status) in statuses {
                    self.store.upsert(
                        name,
                        ChannelUpdate {
                            status,
                            parameters: None,
                        },
                        UpdateSource::Poll,
                    );
                }
            }
            Err(e) => warn!("Status poll failed: {}", e),
        }
    }

    pub(crate) fn start_status_poll(self: &Arc<Self>) {
        let period = self.settings.lock().status_interval();
        let action = timer_action(self, |session| async move { session.poll_status().await });
        self.scheduler.start_repeating(STATUS_POLL, period, action);
    }

    /// Fetch the plot of the selected channel
    pub async fn refresh_plot(&self) -> Result<()> {
        let name = self.selected().await?;
        match self.backend.fetch_plot(&name).await {
            Ok(svg) => {
                self.emit(ViewEvent::PlotLoaded { name, svg });
                Ok(())
            }
            Err(e) => {
                self.emit(ViewEvent::FetchFailure {
                    what: "plot",
                    name,
                    reason: e.reason(),
                });
                Err(e)
            }
        }
    }

    /// Start or stop the plot refresh; returns true when now running
    ///
    /// Starting refreshes once right away. `period` defaults to the
    /// configured plot interval and must not be zero.
    pub fn toggle_plot_refresh(self: &Arc<Self>, period: Option<Duration>) -> Result<bool> {
        let period = period.unwrap_or_else(|| self.settings.lock().plot_interval());
        if period.is_zero() {
            return Err(DashboardError::InvalidInput(
                "plot refresh period must be greater than 0".into(),
            ));
        }
        let action = timer_action(self, |session| async move {
            if let Err(e) = session.refresh_plot().await {
                debug!("Plot refresh failed: {}", e);
            }
        });
        let running = self.scheduler.toggle_repeating(PLOT_REFRESH, period, action);
        info!(running, period_ms = period.as_millis() as u64, "Plot refresh toggled");
        Ok(running)
    }

    /// Clear the recorded trace of the selected channel
    pub async fn clear_plot(&self) -> Result<()> {
        let name = self.selected().await?;
        self.execute(Command::channel(CommandKind::ClearTrace, name))
            .await?;
        self.emit(ViewEvent::PlotCleared);
        Ok(())
    }

    async fn selected(&self) -> Result<String> {
        self.store
            .selection()
            .await
            .ok_or_else(|| DashboardError::InvalidInput("no channel selected".into()))
    }
}

/// Timer action holding only a weak reference to the session
fn timer_action<F, Fut>(session: &Arc<DashboardSession>, run: F) -> TimerAction
where
    F: Fn(Arc<DashboardSession>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let weak: Weak<DashboardSession> = Arc::downgrade(session);
    let run = Arc::new(run);
    Arc::new(move || {
        let weak = weak.clone();
        let run = Arc::clone(&run);
        Box::pin(async move {
            if let Some(session) = weak.upgrade() {
                run(session).await;
            }
        })
    })
}
