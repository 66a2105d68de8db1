//! songdrop - Concurrent batch downloader for resolved song lists

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod download;
mod song;
mod utils;

#[cfg(test)]
mod test_support;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "songdrop=debug,reqwest=debug"
    } else {
        "songdrop=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(utils::ProgressAwareMakeWriter),
        )
        .init();

    match cli.command {
        Commands::Download {
            selection,
            path,
            lyric,
            parallel,
            quiet,
        } => cli::commands::download(selection, path, lyric, parallel, quiet).await,
        Commands::Config { init } => {
            cli::commands::config(init)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
            Ok(ExitCode::SUCCESS)
        }
    }
}
