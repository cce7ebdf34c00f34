use clap::Parser;
use miette::Report;

use resocket::cli::diagnostic::{ConfigDiagnostic, ConnectionDiagnostic};
use resocket::cli::output::{self, OutputConfig};
use resocket::cli::{self, Cli};
use resocket::error::Error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    // tokio-tungstenite's rustls stack needs a process-wide crypto provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    if let Err(e) = cli::execute(&cli).await {
        report(&cli, &e);
        std::process::exit(1);
    }
}

fn report(cli: &Cli, err: &Error) {
    if output::is_json() {
        output::error(&err.to_string());
        return;
    }

    let name = cli.config.display().to_string();
    let source = std::fs::read_to_string(&cli.config).unwrap_or_default();
    if let Some(diag) = ConfigDiagnostic::from_error(err, &name, &source) {
        eprintln!("{:?}", Report::new(diag));
        return;
    }
    match err {
        Error::Connection(message) => {
            eprintln!("{:?}", Report::new(ConnectionDiagnostic::new(message.clone())));
        }
        other => output::error(&other.to_string()),
    }
}
