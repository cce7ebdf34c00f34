//! CLI output formatting.
//!
//! Human-readable output uses colored symbols; `--json` switches every helper
//! to one JSON object per line (`{"type": ..., "payload": ...}`) for
//! scripting, and `--quiet` suppresses everything but warnings and errors.

use std::fmt::Display;
use std::sync::{OnceLock, RwLock};

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

use crate::runtime::ClientEvent;

/// Runtime output configuration shared by CLI handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Emit machine-readable JSON output instead of human-readable text.
    pub json: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
    /// Verbosity level (0 = normal, 1+ = increasingly verbose).
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static OUTPUT_CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn config_cell() -> &'static RwLock<OutputConfig> {
    OUTPUT_CONFIG.get_or_init(|| RwLock::new(OutputConfig::default()))
}

fn read_config() -> OutputConfig {
    match config_cell().read() {
        Ok(config) => *config,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn write_config(config: OutputConfig) {
    match config_cell().write() {
        Ok(mut current) => *current = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

fn regular_output_suppressed(config: OutputConfig) -> bool {
    !config.json && config.quiet
}

/// Emit a JSON line with type and payload structure.
fn emit_json_line(kind: &str, payload: serde_json::Value) {
    println!(
        "{}",
        json!({
            "type": kind,
            "payload": payload,
        })
    );
}

/// Apply output settings from global CLI flags.
pub fn configure(config: OutputConfig) {
    write_config(config);
}

#[must_use]
pub fn is_json() -> bool {
    read_config().json
}

#[must_use]
pub fn verbosity() -> u8 {
    read_config().verbose
}

/// Print the application header with name and version.
pub fn header(version: &str) {
    let config = read_config();
    if config.json {
        emit_json_line(
            "header",
            json!({
                "app": "resocket",
                "version": version,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("{} {}", "resocket".bold(), version.dimmed());
    println!();
}

/// Print a section header.
pub fn section(title: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("section", json!({ "title": title }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!();
    println!("{}", title.bold());
}

/// Print a labeled value.
pub fn field(label: &str, value: impl Display) {
    let config = read_config();
    let value = value.to_string();

    if config.json {
        emit_json_line(
            "field",
            json!({
                "label": label,
                "value": value,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {:<18} {}", label.dimmed(), value);
}

pub fn success(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("success", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("warning", json!({ "message": message }));
        return;
    }

    println!("  {} {}", "⚠".yellow(), message);
}

/// Print an error line to stderr.
pub fn error(message: &str) {
    let config = read_config();

    if config.json {
        eprintln!(
            "{}",
            json!({
                "type": "error",
                "payload": { "message": message },
            })
        );
        return;
    }

    eprintln!("  {} {}", "×".red(), message);
}

pub fn note(message: &str) {
    let config = read_config();

    if config.json {
        emit_json_line("note", json!({ "message": message }));
        return;
    }
    if regular_output_suppressed(config) {
        return;
    }

    println!("  {}", message.dimmed());
}

/// Print a serializable document, pretty in text mode.
pub fn document<T: Serialize>(kind: &str, value: &T) {
    let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    if is_json() {
        emit_json_line(kind, value);
        return;
    }
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

/// Print one client event as a streaming line.
///
/// Application messages always print; state changes only with `-v`.
pub fn event(timestamp: &str, event: &ClientEvent) {
    let config = read_config();

    if config.json {
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        emit_json_line(
            "event",
            json!({
                "timestamp": timestamp,
                "event": payload,
            }),
        );
        return;
    }
    if regular_output_suppressed(config) && !matches!(event, ClientEvent::Message(_)) {
        return;
    }

    let stamp = timestamp.dimmed();
    match event {
        ClientEvent::Message(message) => {
            println!("  {stamp} {} {}", message.kind.cyan(), message.payload);
        }
        ClientEvent::Opened { url } => println!("  {stamp} {} {url}", "open".green()),
        ClientEvent::Closed { code, reason } => {
            println!("  {stamp} {} {code} {reason}", "closed".yellow());
        }
        ClientEvent::Error(err) => println!("  {stamp} {} {err}", "error".red()),
        ClientEvent::ReconnectScheduled { attempt, delay_ms } => {
            println!(
                "  {stamp} {} attempt {attempt} in {delay_ms}ms",
                "reconnect".yellow()
            );
        }
        ClientEvent::ReconnectExhausted { attempts } => {
            println!(
                "  {stamp} {} after {attempts} attempts",
                "gave up".red()
            );
        }
        ClientEvent::CircuitBreakerOpened { failures } => {
            println!(
                "  {stamp} {} after {failures} consecutive failures",
                "breaker open".red()
            );
        }
        ClientEvent::CircuitBreakerClosed => {
            println!("  {stamp} {}", "breaker closed".green());
        }
        ClientEvent::StateChanged(snapshot) => {
            if config.verbose > 0 {
                println!(
                    "  {stamp} {} {} (attempts {}/{})",
                    "state".dimmed(),
                    snapshot.phase,
                    snapshot.reconnect_attempts,
                    snapshot.max_reconnect_attempts
                );
            }
        }
    }
}

/// Format a highlighted value in cyan.
pub fn highlight(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.cyan())
}

/// Format a dimmed/muted value.
pub fn muted(value: impl Display) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    format!("{}", value.dimmed())
}
