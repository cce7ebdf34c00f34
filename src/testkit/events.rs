//! Waiting on client events.
//!
//! Under paused time the runtime jumps straight to the next timer while
//! these helpers wait, so backoff delays cost nothing in wall-clock time.

use std::time::Duration;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

use crate::runtime::ClientEvent;

/// Virtual-time limit for [`wait_for`].
pub const WAIT_LIMIT: Duration = Duration::from_secs(600);

/// Receive events until one matches `pred`, returning it.
///
/// # Panics
///
/// Panics if nothing matches within [`WAIT_LIMIT`] or the client is gone.
pub async fn wait_for<F>(rx: &mut Receiver<ClientEvent>, mut pred: F) -> ClientEvent
where
    F: FnMut(&ClientEvent) -> bool,
{
    let search = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("client stopped while waiting for event"),
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, search)
        .await
        .expect("timed out waiting for event")
}

/// Receive events until one matches `pred`, returning everything seen.
pub async fn collect_until<F>(rx: &mut Receiver<ClientEvent>, mut pred: F) -> Vec<ClientEvent>
where
    F: FnMut(&ClientEvent) -> bool,
{
    let mut seen = Vec::new();
    let search = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = pred(&event);
                    seen.push(event);
                    if done {
                        return;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("client stopped while collecting events"),
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, search)
        .await
        .expect("timed out collecting events");
    seen
}

/// Everything already buffered, without waiting.
pub fn drain(rx: &mut Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return seen,
        }
    }
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
