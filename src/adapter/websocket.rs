//! WebSocket transport built on tokio-tungstenite.
//!
//! [`WebSocketConnector::connect`] performs the handshake and then hands the
//! socket to a pump task that shuttles frames between the socket and the
//! returned [`Link`]. The pump owns the socket for its whole life:
//!
//! - **Text frames** become [`TransportEvent::Text`](super::TransportEvent::Text).
//! - **Ping frames** are answered with a pong carrying the same payload.
//! - **Close frames** become [`TransportEvent::Closed`](super::TransportEvent::Closed)
//!   with the peer's code.
//! - **Errors** are reported, followed by an abnormal (1006) close.
//! - **Binary and pong frames** are ignored.
//!
//! The pump exits when the socket closes or the link is dropped.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::transport::{Connector, Frame, Link, LinkPeer};
use crate::domain::close;
use crate::error::Result;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Link> {
        debug!(url = %url, "Opening WebSocket");
        let (socket, response) = connect_async(url).await?;
        info!(status = %response.status(), "WebSocket handshake complete");

        let (link, peer) = Link::pair();
        tokio::spawn(pump(socket, peer));
        Ok(link)
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Move frames between `socket` and the client until either side goes away.
async fn pump(socket: Socket, mut peer: LinkPeer) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = peer.next_frame() => match frame {
                Some(Frame::Text(text)) => {
                    trace!(bytes = text.len(), "Sending text frame");
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(error = %e, "WebSocket send failed");
                        peer.fail(e.to_string());
                        peer.close(close::ABNORMAL, e.to_string());
                        break;
                    }
                }
                Some(Frame::Close { code, reason }) => {
                    debug!(code, reason = %reason, "Closing WebSocket");
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => {
                    debug!("Link dropped, closing WebSocket");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    trace!(bytes = text.len(), "Received text frame");
                    if !peer.send_text(text) {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WebSocket ping");
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!(error = %e, "Failed to answer ping");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (close::NO_STATUS, String::new()),
                        |f| (u16::from(f.code), f.reason.into_owned()),
                    );
                    info!(code, reason = %reason, "WebSocket closed by server");
                    peer.close(code, reason);
                    // Flushes the close reply tungstenite queued for us.
                    let _ = sink.flush().await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    peer.fail(e.to_string());
                    peer.close(close::ABNORMAL, e.to_string());
                    break;
                }
                None => {
                    info!("WebSocket stream ended");
                    peer.close(close::ABNORMAL, "connection lost");
                    break;
                }
            },
        }
    }
}
