//! Named repeating timers (status poll, plot refresh)
//!
//! Each tick spawns the action as its own task, so a slow request never delays
//! the next tick. Stopping a timer cancels future ticks only; an action that
//! is already in flight still completes and applies its result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Timer key of the periodic status poll
pub const STATUS_POLL: &str = "status_poll";
/// Timer key of the user-toggled plot refresh
pub const PLOT_REFRESH: &str = "plot_refresh";

/// Boxed future returned by a timer action
pub type ActionFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
/// Action run on every tick
pub type TimerAction = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Owns every live timer, at most one per key
#[derive(Default)]
pub struct PollScheduler {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer; the first tick fires one `period` from now
    ///
    /// Does nothing if a live timer already exists for `key` or `period` is zero.
    pub fn start_repeating(&self, key: &str, period: Duration, action: TimerAction) {
        if period.is_zero() {
            warn!(timer = key, "Refusing to arm a timer with a zero period");
            return;
        }

        let mut timers = self.timers.lock();
        if timers.get(key).is_some_and(|h| !h.is_finished()) {
            debug!(timer = key, "Timer already running");
            return;
        }

        let label = key.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tokio::spawn(action());
            }
        });

        timers.insert(label, handle);
        debug!(timer = key, period_ms = period.as_millis() as u64, "Timer started");
    }

    /// Cancel future ticks of `key`; no-op when not running
    pub fn stop_repeating(&self, key: &str) {
        if let Some(handle) = self.timers.lock().remove(key) {
            handle.abort();
            debug!(timer = key, "Timer stopped");
        }
    }

    /// Start (running the action once right away) or stop; returns true when now running
    pub fn toggle_repeating(&self, key: &str, period: Duration, action: TimerAction) -> bool {
        if self.is_running(key) {
            self.stop_repeating(key);
            false
        } else if period.is_zero() {
            warn!(timer = key, "Refusing to arm a timer with a zero period");
            false
        } else {
            tokio::spawn(action());
            self.start_repeating(key, period, action);
            true
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.timers
            .lock()
            .get(key)
            .is_some_and(|h| !h.is_finished())
    }

    pub fn stop_all(&self) {
        for (key, handle) in self.timers.lock().drain() {
            handle.abort();
            debug!(timer = %key, "Timer stopped");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}
