//! Transport seam between the client and a concrete socket implementation.
//!
//! A [`Connector`] opens a [`Link`]: a pair of channels standing in for one
//! live message-oriented connection. The client writes [`Frame`]s and reads
//! [`TransportEvent`]s; the connector's side of the pair is a [`LinkPeer`],
//! usually driven by a pump task that owns the real socket.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::Result;

/// Frame written by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Close the connection with a status code and reason.
    Close { code: u16, reason: String },
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// Non-fatal report; a [`TransportEvent::Closed`] follows if the
    /// connection is lost.
    Error(String),
    Closed { code: u16, reason: String },
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`, resolving once it is ready for traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(&self, url: &str) -> Result<Link>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Client side of one live transport.
///
/// Dropping the link releases the transport; the peer observes its frame
/// channel closing.
#[derive(Debug)]
pub struct Link {
    outbound: UnboundedSender<Frame>,
    inbound: UnboundedReceiver<TransportEvent>,
}

/// Transport side of a [`Link`].
#[derive(Debug)]
pub struct LinkPeer {
    frames: UnboundedReceiver<Frame>,
    events: UnboundedSender<TransportEvent>,
}

impl Link {
    /// Create a connected in-memory pair.
    #[must_use]
    pub fn pair() -> (Self, LinkPeer) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: frame_tx,
                inbound: event_rx,
            },
            LinkPeer {
                frames: frame_rx,
                events: event_tx,
            },
        )
    }

    /// A sender for writing frames without holding the link.
    #[must_use]
    pub fn sender(&self) -> UnboundedSender<Frame> {
        self.outbound.clone()
    }

    /// Next transport event; `None` once the peer has gone away.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    /// Ask the transport to close, then release it.
    pub fn close(self, code: u16, reason: impl Into<String>) {
        let _ = self.outbound.send(Frame::Close {
            code,
            reason: reason.into(),
        });
    }
}

impl LinkPeer {
    /// Next frame from the client; `None` once the link is dropped.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Non-blocking variant of [`LinkPeer::next_frame`].
    pub fn try_frame(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }

    /// Deliver an event to the client. Returns `false` if the link is gone.
    pub fn deliver(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.deliver(TransportEvent::Text(text.into()))
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.deliver(TransportEvent::Closed {
            code,
            reason: reason.into(),
        })
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.deliver(TransportEvent::Error(reason.into()))
    }

    /// Whether the client still holds the link.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        !self.events.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_carries_frames_and_events() {
        let (mut link, mut peer) = Link::pair();

        link.sender().send(Frame::Text("hi".into())).unwrap();
        assert_eq!(peer.next_frame().await, Some(Frame::Text("hi".into())));

        assert!(peer.send_text("yo"));
        assert_eq!(link.recv().await, Some(TransportEvent::Text("yo".into())));
    }

    #[tokio::test]
    async fn close_sends_close_frame_and_releases() {
        let (link, mut peer) = Link::pair();
        link.close(1000, "bye");

        assert_eq!(
            peer.next_frame().await,
            Some(Frame::Close {
                code: 1000,
                reason: "bye".into()
            })
        );
        assert_eq!(peer.next_frame().await, None);
        assert!(!peer.is_linked());
    }

    #[tokio::test]
    async fn dropping_peer_ends_event_stream() {
        let (mut link, peer) = Link::pair();
        drop(peer);
        assert_eq!(link.recv().await, None);
    }

    #[test]
    fn try_frame_is_empty_until_written() {
        let (link, mut peer) = Link::pair();
        assert_eq!(peer.try_frame(), None);
        link.sender().send(Frame::Text("x".into())).unwrap();
        assert_eq!(peer.try_frame(), Some(Frame::Text("x".into())));
        drop(link);
        assert!(!peer.is_linked());
    }
}
