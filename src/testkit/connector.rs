//! In-memory [`Connector`] with scripted outcomes.
//!
//! Each call to `connect()` pops the next [`Attempt`] from the script
//! (defaults to [`Attempt::Open`] when exhausted). Opened links hand their
//! [`LinkPeer`] to the [`ConnectorProbe`] so tests can play the server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::adapter::{Connector, Link, LinkPeer};
use crate::error::{Error, Result};

/// Outcome of one scripted connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Open,
    Fail(String),
    /// Never resolves; the attempt only ends by timeout or cancellation.
    Hang,
}

impl Attempt {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

#[derive(Debug, Default)]
struct Record {
    script: VecDeque<Attempt>,
    urls: Vec<String>,
}

/// A connector whose attempts follow a script.
pub struct ScriptedConnector {
    record: Arc<Mutex<Record>>,
    connect_count: Arc<AtomicU32>,
    peers: UnboundedSender<LinkPeer>,
}

/// Test-side view of a [`ScriptedConnector`].
pub struct ConnectorProbe {
    record: Arc<Mutex<Record>>,
    connect_count: Arc<AtomicU32>,
    peers: UnboundedReceiver<LinkPeer>,
}

impl ScriptedConnector {
    pub fn new() -> (Self, ConnectorProbe) {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Attempt>) -> (Self, ConnectorProbe) {
        let record = Arc::new(Mutex::new(Record {
            script: script.into(),
            urls: Vec::new(),
        }));
        let connect_count = Arc::new(AtomicU32::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                record: record.clone(),
                connect_count: connect_count.clone(),
                peers: tx,
            },
            ConnectorProbe {
                record,
                connect_count,
                peers: rx,
            },
        )
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Link> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut record = self.record.lock();
            record.urls.push(url.to_string());
            record.script.pop_front().unwrap_or(Attempt::Open)
        };

        match attempt {
            Attempt::Open => {
                let (link, peer) = Link::pair();
                let _ = self.peers.send(peer);
                Ok(link)
            }
            Attempt::Fail(reason) => Err(Error::Connection(reason)),
            Attempt::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl ConnectorProbe {
    /// Number of times `connect()` has been called.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// URLs passed to `connect()`, in order.
    pub fn urls(&self) -> Vec<String> {
        self.record.lock().urls.clone()
    }

    /// Append attempts to the script.
    pub fn push(&self, attempts: impl IntoIterator<Item = Attempt>) {
        self.record.lock().script.extend(attempts);
    }

    /// Wait for the next opened link.
    pub async fn next_peer(&mut self) -> LinkPeer {
        self.peers.recv().await.expect("connector dropped")
    }

    /// An opened link, if one is waiting.
    pub fn try_peer(&mut self) -> Option<LinkPeer> {
        self.peers.try_recv().ok()
    }
}
