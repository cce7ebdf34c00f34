//! The `resocket` command-line interface.

pub mod command;
pub mod config;
pub mod diagnostic;
pub mod listen;
pub mod output;
pub mod send;

use std::path::Path;

pub use command::{Cli, Commands, ConfigCommand};

use crate::config::Config;
use crate::error::Result;

/// Load configuration for a command.
///
/// A missing file falls back to defaults, except for `config validate`
/// where the file itself is the subject. `url` replaces `client.url` after
/// the environment override.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path, require_file: bool, url: Option<&str>) -> Result<Config> {
    let mut config = if require_file {
        Config::load(path)?
    } else {
        Config::load_or_default(path)?
    };
    if let Some(url) = url {
        config.client.url = url.to_string();
    }
    config.logging = config.logging.with_verbosity(output::verbosity());
    Ok(config)
}

/// Run the parsed command line.
///
/// # Errors
///
/// Returns the first error raised by the selected command.
pub async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Listen(args) => {
            let config = load_config(&cli.config, false, args.target.url.as_deref())?;
            config.validate()?;
            config.init_logging();
            listen::execute(&config, args).await
        }
        Commands::Send(args) => {
            let config = load_config(&cli.config, false, args.target.url.as_deref())?;
            config.validate()?;
            config.init_logging();
            send::execute(&config, args).await
        }
        Commands::Config(ConfigCommand::Show) => {
            let config = load_config(&cli.config, false, None)?;
            config::execute_show(&config, &cli.config)
        }
        Commands::Config(ConfigCommand::Validate) => {
            let config = load_config(&cli.config, true, None)?;
            config::execute_validate(&config, &cli.config)
        }
    }
}
