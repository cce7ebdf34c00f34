//! Handler for the `send` command.

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;

use crate::cli::command::SendArgs;
use crate::cli::output;
use crate::config::Config;
use crate::domain::OutboundMessage;
use crate::error::{Error, Result};
use crate::runtime::{ClientEvent, ConnectOutcome, ReconnectingClient};

/// Execute `send`: connect, send one message, optionally await a reply,
/// disconnect.
pub async fn execute(config: &Config, args: &SendArgs) -> Result<()> {
    let message = build_message(&args.kind, args.data.as_deref())?;
    let client = ReconnectingClient::websocket(config.client.clone());
    let mut events = client.subscribe();

    if let ConnectOutcome::Skipped(reason) = client.connect().await? {
        return Err(Error::Connection(reason.to_string()));
    }

    let result = exchange(&client, &mut events, config, args, &message).await;
    client.disconnect().await?;
    result
}

async fn exchange(
    client: &ReconnectingClient,
    events: &mut broadcast::Receiver<ClientEvent>,
    config: &Config,
    args: &SendArgs,
    message: &OutboundMessage,
) -> Result<()> {
    let limit = config.client.connect_timeout();

    timeout(limit, next_matching(events, |e| matches!(e, ClientEvent::Opened { .. })))
        .await
        .map_err(|_| Error::Connection(format!("not connected within {}ms", limit.as_millis())))??;

    if !client.send(message) {
        return Err(Error::Connection("connection closed before sending".into()));
    }
    output::success(&format!("Sent {}", output::highlight(message.kind())));

    if args.wait {
        let reply = timeout(limit, next_matching(events, |e| matches!(e, ClientEvent::Message(_))))
            .await
            .map_err(|_| Error::Connection(format!("no reply within {}ms", limit.as_millis())))??;
        output::event(&Utc::now().format("%H:%M:%S%.3f").to_string(), &reply);
    }
    Ok(())
}

/// Wait for an event matching `pred`, failing on the first connection error.
async fn next_matching<F>(
    events: &mut broadcast::Receiver<ClientEvent>,
    pred: F,
) -> Result<ClientEvent>
where
    F: Fn(&ClientEvent) -> bool,
{
    loop {
        match events.recv().await {
            Ok(event) if pred(&event) => return Ok(event),
            Ok(ClientEvent::Error(err)) if err.is_connectivity() => {
                return Err(Error::Connection(err.to_string()));
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return Err(Error::ClientStopped),
        }
    }
}

/// Build the outgoing message from `--type` and `--data`.
///
/// # Errors
///
/// Returns an error if `data` is not valid JSON.
pub fn build_message(kind: &str, data: Option<&str>) -> Result<OutboundMessage> {
    let message = OutboundMessage::new(kind);
    match data {
        Some(raw) => Ok(message.with_payload(serde_json::from_str(raw)?)),
        None => Ok(message),
    }
}
