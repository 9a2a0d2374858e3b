//! Sift CLI - Main entry point

use clap::Parser;
use sift_cli::{Cli, Commands, Config};
use sift_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = cli.command.as_ref() else {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    };

    // Verbose: debug to console; otherwise only warnings and errors
    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Warn };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("sift-cli")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring invalid logging environment: {}", e);
            log_config
        },
    };

    // CLI works without logging
    let _guard = init_logging(&log_config).ok();

    let config = Config::from_env().with_overrides(cli.manifest.clone(), cli.state.clone());

    if let Err(e) = execute_command(command, &config).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(command: &Commands, config: &Config) -> sift_cli::Result<()> {
    match command {
        Commands::Check { names } => sift_cli::commands::check::run(config, names).await,

        Commands::Hash { dir, include, list } => {
            sift_cli::commands::hash::run(include.with_dir(dir), *list).await
        },

        Commands::Files { dir, include } => {
            sift_cli::commands::files::run(include.with_dir(dir)).await
        },

        Commands::Status => sift_cli::commands::status::run(config).await,
    }
}
