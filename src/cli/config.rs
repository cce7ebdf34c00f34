//! Handler for the `config` command group.

use std::path::Path;

use crate::cli::output;
use crate::config::Config;
use crate::error::Result;

/// Execute `config show`.
pub fn execute_show(config: &Config, path: &Path) -> Result<()> {
    if output::is_json() {
        output::document("config", config);
        return Ok(());
    }

    let client = &config.client;
    output::header(env!("CARGO_PKG_VERSION"));
    output::field("File", path.display());
    if !path.exists() {
        output::note("(file not found, showing defaults)");
    }

    output::section("Client");
    output::field(
        "URL",
        if client.url.is_empty() {
            output::muted("(unset)")
        } else {
            output::highlight(&client.url)
        },
    );
    output::field("Enabled", client.enabled);
    output::field("Connect timeout", format!("{}ms", client.connect_timeout_ms));
    output::field(
        "Ping interval",
        match client.ping_interval() {
            Some(_) => format!("{}ms", client.ping_interval_ms),
            None => "disabled".into(),
        },
    );
    output::field("Event capacity", client.event_capacity);

    output::section("Reconnect");
    output::field("Base delay", format!("{}ms", client.base_delay_ms));
    output::field("Max delay", format!("{}ms", client.max_delay_ms));
    output::field("Jitter", format!("{}ms", client.jitter_ms));
    output::field("Max attempts", client.max_reconnect_attempts);
    output::field("Min interval", format!("{}ms", client.min_attempt_interval_ms));
    output::field("Force delay", format!("{}ms", client.force_reconnect_delay_ms));

    output::section("Circuit breaker");
    output::field("Threshold", client.circuit_breaker.failure_threshold);
    output::field("Reset after", format!("{}ms", client.circuit_breaker.reset_after_ms));

    output::section("Logging");
    output::field("Level", &config.logging.level);
    output::field("Format", &config.logging.format);
    Ok(())
}

/// Execute `config validate`.
pub fn execute_validate(config: &Config, path: &Path) -> Result<()> {
    config.validate()?;
    output::success(&format!("{} is valid", path.display()));
    Ok(())
}
