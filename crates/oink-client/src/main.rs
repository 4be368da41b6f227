//! oink CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use oink_client::cli::{Cli, Command, ConfigAction};
use oink_client::commands;
use oink_client::config::ClientConfig;
use oink_client::error::ClientResult;
use oink_core::{TracingConfig, init_tracing};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        match cli.command {
            // Search answers and listener events are reported through logs.
            Command::Listen { .. } | Command::Search { .. } => TracingConfig::listener(),
            _ => TracingConfig::default(),
        }
    };
    if let Err(e) = init_tracing(tracing_config.with_format(cli.log_format.into())) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ClientResult<()> {
    let mut config = if let Some(ref path) = cli.config {
        ClientConfig::load_from(path)?
    } else {
        ClientConfig::load()?
    };
    cli.apply_overrides(&mut config);

    match cli.command {
        Command::Listen { scan } => commands::listen::listen(&config, scan),
        Command::Send { to, text, binary } => {
            commands::send::message(&config, &to, text.join(" "), binary)
        }
        Command::Search { to, query } => commands::send::search(&config, &to, query),
        Command::Scan { first, last } => commands::scan::scan(&config, first, last),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
