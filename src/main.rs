// ABOUTME: Entry point for the mora CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use mora::config::{self, Config};
use mora::error::Result;
use mora::output::Output;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    if let Err(e) = run(cli).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;
    let output = Output::new(cli.output);

    if let Commands::Init { force } = cli.command {
        let path = config::init_config(&cwd, force)?;
        output.success(&format!("Created {}", path.display()));
        return Ok(());
    }

    let (config, base) = load_config(cli.config.as_deref(), &cwd)?;
    let engine = commands::open_engine(&config, &base)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Submit {
            plan,
            user,
            environment,
        } => commands::submit(&engine, &plan, &user, &environment, output).await,
        Commands::Configure {
            deployment,
            set,
            inherit,
        } => commands::configure(&engine, &deployment, &set, &inherit, output).await,
        Commands::Resume { deployment } => commands::resume(&engine, &deployment, output).await,
        Commands::Status { deployment } => commands::status(&engine, &deployment, output).await,
        Commands::List { environment } => {
            commands::list(&engine, environment.as_deref(), output).await
        }
        Commands::Cancel { deployment } => commands::cancel(&engine, &deployment, output).await,
    }
}

/// The config and the directory its relative paths resolve against.
fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<(Config, PathBuf)> {
    match explicit {
        Some(path) => {
            let config = Config::load(path)?;
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.to_path_buf());
            Ok((config, base))
        }
        None => Ok((Config::discover(cwd)?, cwd.to_path_buf())),
    }
}
