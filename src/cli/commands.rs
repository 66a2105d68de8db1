//! CLI command handlers

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::download::{
    spawn_signal_listener, BatchDownloader, BatchReport, CleanupGuard, FailureTracker,
    ProgressSink, TerminalProgress,
};
use crate::song::{SongDefaults, SongSelection};
use crate::utils;

/// Handle the `download` command
pub async fn download(
    selection: Option<PathBuf>,
    path: Option<PathBuf>,
    lyric: bool,
    parallel: Option<usize>,
    quiet: bool,
) -> Result<ExitCode> {
    let config = AppConfig::load()?;

    let target_dir = match path.or_else(|| config.download_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine working directory")?,
    };
    let defaults = SongDefaults {
        lyric: lyric || config.lyric,
        path: target_dir,
    };

    let selection = SongSelection::load(selection.as_deref(), &defaults)?;
    if selection.is_empty() {
        eprintln!("{}", "No songs selected".red());
        return Ok(ExitCode::FAILURE);
    }

    let progress = Arc::new(if quiet {
        TerminalProgress::hidden()
    } else {
        TerminalProgress::new()
    });
    let tracker = FailureTracker::new();
    let cleanup = CleanupGuard::new(tracker.clone());

    let multi = progress.multi().clone();
    spawn_signal_listener(cleanup.handle(), move || {
        let _ = multi.clear();
    })?;

    println!("{}", "Download started...".green());
    utils::attach_display(progress.multi());

    let sink: Arc<dyn ProgressSink> = progress.clone();
    let engine = BatchDownloader::new(
        config.build_client()?,
        sink,
        tracker,
        parallel.or(config.parallel),
    );
    let result = engine.run(selection.songs).await;
    utils::detach_display();

    let code = match result {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Bars of songs prepared before the abort never finish
            progress.clear();
            eprintln!("{}", e.to_string().red());
            ExitCode::FAILURE
        }
    };

    drop(cleanup);
    Ok(code)
}

fn print_summary(report: &BatchReport) {
    println!();
    println!(
        "{}",
        format!(
            "Download complete: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        )
        .green()
    );

    if report.failed() > 0 {
        println!("{}", "Failures:".red().bold());
        for line in report.failure_lines() {
            println!("  {}", line.red());
        }
    }

    let warnings = report.lyric_warnings();
    if !warnings.is_empty() {
        println!("{}", "Lyrics not saved:".yellow().bold());
        for (song, reason) in warnings {
            println!("  {}: {}", song, reason.yellow());
        }
    }
}

/// Handle the `config` command
pub fn config(init: bool) -> Result<()> {
    let path = AppConfig::config_path()?;

    if init {
        if path.exists() {
            println!("Config already exists at {}", path.display().to_string().cyan());
            return Ok(());
        }
        let written = AppConfig::default().save()?;
        println!("{} {}", "Wrote default config to".green(), written.display());
        return Ok(());
    }

    let config = AppConfig::load()?;
    println!("{} {}", "Config file:".bold(), path.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}

/// Handle the `completion` command
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = super::Cli::command();
    generate(shell, &mut cmd, "songdrop", &mut io::stdout());
}
