//! Command-line interface definitions.
//!
//! Defines the CLI structure for the resocket binary using `clap`. Global
//! flags select the configuration file and output mode; subcommands either
//! talk to a server or inspect configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Reconnecting WebSocket message client
#[derive(Parser, Debug)]
#[command(name = "resocket")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and print messages and connection events until Ctrl-C
    Listen(ListenArgs),

    /// Connect, send one message, and disconnect
    Send(SendArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Subcommands for `resocket config`.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration with defaults applied.
    Show,
    /// Validate the configuration file for correctness.
    Validate,
}

/// Connection target shared by commands that open a socket.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Server URL; overrides `client.url` and `RESOCKET_URL`
    #[arg(short, long)]
    pub url: Option<String>,
}

/// Arguments for the `listen` subcommand.
#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Exit after this many application messages
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Message type (the `type` field)
    #[arg(short = 't', long = "type")]
    pub kind: String,

    /// JSON payload; object fields are merged, anything else goes under `data`
    #[arg(short, long)]
    pub data: Option<String>,

    /// Wait for one reply message before disconnecting
    #[arg(short, long)]
    pub wait: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_send_with_global_flags_anywhere() {
        let cli = Cli::parse_from([
            "resocket",
            "send",
            "--type",
            "chat",
            "--data",
            r#"{"text":"hi"}"#,
            "--json",
            "-c",
            "other.toml",
        ]);
        assert!(cli.json);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.kind, "chat");
        assert_eq!(args.data.as_deref(), Some(r#"{"text":"hi"}"#));
        assert!(!args.wait);
    }

    #[test]
    fn config_defaults_to_local_file() {
        let cli = Cli::parse_from(["resocket", "-vv", "config", "show"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Show)));
    }

    #[test]
    fn send_requires_type() {
        assert!(Cli::try_parse_from(["resocket", "send"]).is_err());
    }
}
