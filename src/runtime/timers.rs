//! Purpose-tagged timer registry.
//!
//! Each timer is a spawned task that posts a message back to the driver when
//! it fires. At most one timer per [`TimerKind`] exists; arming a kind again
//! aborts the previous one. Dropping the registry aborts everything.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Periodic liveness ping while open.
    Ping,
    /// Delayed connection attempt (backoff or forced reconnect).
    Reconnect,
    /// Deadline for the transport to open.
    ConnectTimeout,
}

#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: HashMap<TimerKind, JoinHandle<()>>,
}

impl TimerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `msg` to `tx` once after `delay`.
    pub fn schedule_once<T>(
        &mut self,
        kind: TimerKind,
        delay: Duration,
        tx: UnboundedSender<T>,
        msg: T,
    ) where
        T: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(msg);
        });
        self.insert(kind, handle);
    }

    /// Post a clone of `msg` to `tx` every `period`, first after one period.
    ///
    /// Stops by itself once the receiver is gone.
    pub fn schedule_interval<T>(
        &mut self,
        kind: TimerKind,
        period: Duration,
        tx: UnboundedSender<T>,
        msg: T,
    ) where
        T: Clone + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(msg.clone()).is_err() {
                    break;
                }
            }
        });
        self.insert(kind, handle);
    }

    fn insert(&mut self, kind: TimerKind, handle: JoinHandle<()>) {
        if let Some(previous) = self.timers.insert(kind, handle) {
            previous.abort();
        }
    }

    /// Abort the timer of `kind`. Returns whether one was registered.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        match self.timers.remove(&kind) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forget a one-shot timer that has fired.
    pub fn complete(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }

    /// Abort every timer. Returns how many were registered.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
        count
    }

    #[must_use]
    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    /// Registered kinds in a stable order.
    #[must_use]
    pub fn armed(&self) -> Vec<TimerKind> {
        let mut kinds: Vec<_> = self.timers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
