//! Handler for the `listen` command.

use chrono::Utc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::cli::command::ListenArgs;
use crate::cli::output;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::runtime::{ClientEvent, ConnectOutcome, ReconnectingClient};

/// Execute `listen`: print events until Ctrl-C, `--count` messages, or the
/// client gives up.
pub async fn execute(config: &Config, args: &ListenArgs) -> Result<()> {
    let client = ReconnectingClient::websocket(config.client.clone());
    let mut events = client.subscribe();

    output::header(env!("CARGO_PKG_VERSION"));
    output::field("Server", output::highlight(&config.client.url));

    if let ConnectOutcome::Skipped(reason) = client.connect().await? {
        return Err(Error::Connection(reason.to_string()));
    }

    let cooldown = std::time::Duration::from_millis(config.client.circuit_breaker.reset_after_ms);
    let mut retry_at: Option<Instant> = None;
    let mut received = 0u64;

    let result = loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break Ok(());
            }
            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                retry_at = None;
                // The breaker only re-evaluates when asked.
                let outcome = client.connect().await?;
                info!(?outcome, "Retried after circuit breaker cool-down");
            }
            event = events.recv() => match event {
                Ok(event) => {
                    output::event(&timestamp(), &event);
                    match event {
                        ClientEvent::Message(_) => {
                            received += 1;
                            if args.count.is_some_and(|n| received >= n) {
                                break Ok(());
                            }
                        }
                        ClientEvent::CircuitBreakerOpened { .. } => {
                            retry_at = Some(Instant::now() + cooldown);
                        }
                        ClientEvent::ReconnectExhausted { attempts } => {
                            break Err(Error::Connection(format!(
                                "gave up after {attempts} reconnect attempts"
                            )));
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break Err(Error::ClientStopped),
            }
        }
    };

    client.disconnect().await?;
    if result.is_ok() {
        output::success(&format!("Received {received} messages"));
    }
    result
}

fn timestamp() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}
