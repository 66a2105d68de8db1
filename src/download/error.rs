//! Download error types

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the whole batch before any song is transferred
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No songs selected")]
    EmptySelection,

    #[error("File {} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-song audio transfer failure
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{}", describe(.0))]
    Http(#[from] reqwest::Error),

    #[error("Response code {0}")]
    Status(StatusCode),

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Lyric download failure, never fatal for the song
#[derive(Debug, Error)]
pub enum LyricError {
    #[error("no lyric URL provided")]
    MissingUrl,

    #[error("{} is the lyric file of an earlier song", .0.display())]
    Shared(PathBuf),

    #[error("{}", describe(.0))]
    Http(#[from] reqwest::Error),

    #[error("response code {0}")]
    Status(StatusCode),

    #[error("invalid lyric payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lyric payload has no lines")]
    MissingLines,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// reqwest's top-level message hides the cause; append the source chain
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
