//! CLI entry point and dispatch
//!
//! `run()` parses arguments, resolves configuration, starts tracing and the
//! tokio runtime, dispatches to a command and reports any error. main.rs
//! only turns the returned code into the process exit status.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;
use crate::{CliArgs, Config, ExitCode, WayfarerError};

/// Map parsed flags onto configuration overrides.
#[must_use]
pub fn cli_args(cli: &Cli) -> CliArgs {
    let mut args = CliArgs {
        config_path: cli.config.clone(),
        data_dir: cli.data_dir.as_deref().map(Utf8PathBuf::from),
        generator_mode: cli.generator_mode.clone(),
        generator_command: cli.generator_command.clone(),
        generator_timeout: cli.generator_timeout,
        generator_url: cli.generator_url.clone(),
        api_url: cli.api_url.clone(),
        client_timeout: cli.client_timeout,
        ..CliArgs::default()
    };
    match &cli.command {
        Commands::Serve(listen) => {
            args.host = listen.host.clone();
            args.port = listen.port;
        }
        Commands::GeneratorService(listen) => {
            args.generator_host = listen.host.clone();
            args.generator_port = listen.port;
        }
        _ => {}
    }
    args
}

fn operation(command: &Commands) -> &'static str {
    match command {
        Commands::Serve(_) => "serve",
        Commands::GeneratorService(_) => "generator-service",
        Commands::Generate { .. } => "generate",
        Commands::Plan(_) => "plan",
        Commands::Show { .. } => "show",
        Commands::Regenerate { .. } => "regenerate",
        Commands::Refine { .. } => "refine",
        Commands::Status => "status",
        Commands::Config => "config",
    }
}

async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    let op = operation(&command);
    let result = match command {
        Commands::Serve(_) => commands::execute_serve_command(config).await,
        Commands::GeneratorService(_) => commands::execute_generator_service_command(config).await,
        Commands::Generate { refine } => commands::execute_generate_command(refine),
        Commands::Plan(trip) => commands::execute_plan_command(&trip, config).await,
        Commands::Show { key, last, back } => {
            commands::execute_show_command(key, last, back, config).await
        }
        Commands::Regenerate { key } => commands::execute_regenerate_command(key, config).await,
        Commands::Refine { message } => commands::execute_refine_command(&message, config).await,
        Commands::Status => commands::execute_status_command(config).await,
        Commands::Config => {
            commands::execute_config_command(config);
            Ok(())
        }
    };
    result.with_context(|| format!("wayfarer {op} failed"))
}

fn report(error: &WayfarerError) {
    eprintln!("✗ {error}");
    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        eprintln!("\n  Suggestions:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, suggestion);
        }
    }
}

/// Main CLI execution function.
///
/// Prints all output, errors included. Returns the exit code to use on
/// failure.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = wayfarer_utils::logging::init_tracing(cli.verbose) {
        eprintln!("warning: tracing not initialised: {e}");
    }

    let cli_args = cli_args(&cli);
    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            let err = WayfarerError::from(err);
            report(&err);
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let Err(error) = rt.block_on(dispatch(cli.command, &config)) else {
        return Ok(());
    };

    if let Some(wayfarer_error) = error.downcast_ref::<WayfarerError>() {
        report(wayfarer_error);
        if cli.verbose {
            eprintln!("\n  ({error:#})");
        }
        return Err(wayfarer_error.to_exit_code());
    }

    eprintln!("✗ Unexpected error: {error:#}");
    eprintln!("\n  Run with --verbose for more detailed output");
    Err(ExitCode::INTERNAL)
}
