//! birthdays CLI entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use birthdays_client::cli::{Cli, Command, ConfigAction, ShowArgs};
use birthdays_client::commands;
use birthdays_client::config::ClientConfig;
use birthdays_client::error::{ClientError, ClientResult};
use birthdays_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = match load_config(&cli) {
        Ok(mut config) => {
            cli.apply_to(&mut config);
            config
        }
        Err(e) => return report(e),
    };

    let tracing_config = if cli.json_logs() {
        TracingConfig::daemon()
    } else if config.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli, &config, &config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(e),
    }
}

fn report(error: ClientError) -> ExitCode {
    eprintln!("error: {}", error);
    error.exit_code()
}

fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .map_err(ClientError::Config)
}

async fn run(cli: Cli, config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    match cli.command {
        Some(Command::Show(ref args)) => commands::show::run(args, config).await,
        Some(Command::Watch(ref args)) => commands::watch::run(args, config).await,
        Some(Command::Check) => commands::check::run(config).await,
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(config, config_path),
            ConfigAction::Validate => commands::config::validate(config),
            ConfigAction::Path => commands::config::path(config_path),
        },
        None => commands::show::run(&ShowArgs::default(), config).await,
    }
}
