//! Inactivity auto-lock.
//!
//! The monitor remembers when the user last did something and locks the
//! session once the configured auto-lock period has passed without activity.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::session::{SessionState, VaultSession};

/// How often the background task checks for inactivity.
pub const DEFAULT_TICK: Duration = Duration::from_secs(10);

/// Tracks user activity for one session.
#[derive(Clone)]
pub struct ActivityMonitor {
    session: Arc<VaultSession>,
    last_activity: Arc<Mutex<Instant>>,
}

impl ActivityMonitor {
    /// Create a monitor with activity recorded now.
    pub fn new(session: Arc<VaultSession>) -> Self {
        Self {
            session,
            last_activity: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn last(&self) -> std::sync::MutexGuard<'_, Instant> {
        // An Instant cannot be left half-written, so a poisoned lock is still usable.
        self.last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Note user activity now.
    pub fn record_activity(&self) {
        *self.last() = Instant::now();
    }

    /// Override the last activity time.
    pub fn set_last_activity(&self, at: Instant) {
        *self.last() = at;
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.last().elapsed()
    }

    /// Time left before the session auto-locks, or `None` if it is not
    /// unlocked.
    pub async fn remaining(&self) -> Option<Duration> {
        if self.session.state().await != SessionState::Unlocked {
            return None;
        }
        let limit = self.session.settings().await.auto_lock_after();
        Some(limit.saturating_sub(self.idle_for()))
    }

    /// Run one check. Locks the session and returns `true` if it was
    /// unlocked and idle for longer than the auto-lock period.
    pub async fn check(&self) -> bool {
        if self.session.state().await != SessionState::Unlocked {
            return false;
        }

        let limit = self.session.settings().await.auto_lock_after();
        let idle = self.idle_for();
        if idle <= limit {
            return false;
        }

        info!("Auto-locking vault after {}s idle", idle.as_secs());
        self.session.lock().await;
        true
    }

    /// Run `check` every `tick` in a background task.
    pub fn spawn(&self, tick: Duration) -> MonitorHandle {
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check().await;
            }
        });
        debug!("Activity monitor started, tick {:?}", tick);
        MonitorHandle { task: Some(task) }
    }
}

/// Handle to a running monitor task. Dropping it stops the task.
pub struct MonitorHandle {
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop the monitor.
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Activity monitor stopped");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.abort();
    }
}
