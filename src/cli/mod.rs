//! CLI module for songdrop

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "songdrop", about = "Download a batch of songs with lyrics")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every song in a selection file
    Download {
        /// JSON song list; reads stdin when omitted or `-`
        #[arg(value_name = "SELECTION")]
        selection: Option<PathBuf>,

        /// Target directory for songs that do not name one
        #[arg(short, long, env = "SONGDROP_DIR")]
        path: Option<PathBuf>,

        /// Fetch lyrics for songs that do not say otherwise
        #[arg(short, long)]
        lyric: bool,

        /// Max concurrent downloads (default: all at once)
        #[arg(short = 'j', long, env = "SONGDROP_PARALLEL")]
        parallel: Option<usize>,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Write a config file with default values
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from([
            "songdrop", "download", "songs.json", "--lyric", "-j", "4", "--path", "/music",
        ])
        .unwrap();

        match cli.command {
            Commands::Download {
                selection,
                path,
                lyric,
                parallel,
                quiet,
            } => {
                assert_eq!(selection, Some(PathBuf::from("songs.json")));
                assert_eq!(path, Some(PathBuf::from("/music")));
                assert!(lyric);
                assert_eq!(parallel, Some(4));
                assert!(!quiet);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
