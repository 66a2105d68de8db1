//! Lyric fetching for the supported providers
//!
//! Each provider serves lyrics in its own shape:
//! - migu: the LRC file itself, streamed straight to disk
//! - kuwo: JSON list of `{time, lineLyric}` entries
//! - wangyi: JSON with one LRC blob, possibly empty

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::LyricError;
use crate::song::{KuwoLyricLine, KuwoLyricResponse, Provider, WangyiLyricResponse};

/// Downloads the lyric for one song into an `.lrc` file
#[async_trait]
pub trait LyricFetcher: Send + Sync {
    /// Fetch `url` and write the lyric to `dest`
    ///
    /// `title` is the song's file stem, used when the provider has no text.
    async fn fetch(
        &self,
        client: &Client,
        url: &str,
        title: &str,
        dest: &Path,
    ) -> Result<(), LyricError>;
}

/// Fetcher matching the provider's payload format
pub fn fetcher_for(provider: Provider) -> Box<dyn LyricFetcher> {
    match provider {
        Provider::Migu => Box::new(StreamingLyric),
        Provider::Kuwo => Box::new(TimedLineLyric),
        Provider::Wangyi => Box::new(BlobLyric),
    }
}

async fn get_ok(client: &Client, url: &str) -> Result<reqwest::Response, LyricError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(LyricError::Status(response.status()));
    }
    Ok(response)
}

/// Pipes the response body to the lrc file
pub struct StreamingLyric;

#[async_trait]
impl LyricFetcher for StreamingLyric {
    async fn fetch(
        &self,
        client: &Client,
        url: &str,
        _title: &str,
        dest: &Path,
    ) -> Result<(), LyricError> {
        let response = get_ok(client, url).await?;
        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        debug!("Streamed lyric to {}", dest.display());
        Ok(())
    }
}

/// Joins a list of timed lines into LRC text
pub struct TimedLineLyric;

/// `[time] line` per entry, newline-terminated, in list order
pub fn format_timed_lines(lines: &[KuwoLyricLine]) -> String {
    lines
        .iter()
        .map(|line| format!("[{}] {}\n", line.time, line.line_lyric))
        .collect()
}

#[async_trait]
impl LyricFetcher for TimedLineLyric {
    async fn fetch(
        &self,
        client: &Client,
        url: &str,
        _title: &str,
        dest: &Path,
    ) -> Result<(), LyricError> {
        let body = get_ok(client, url).await?.bytes().await?;
        let payload: KuwoLyricResponse = serde_json::from_slice(&body)?;
        let lines = payload
            .data
            .and_then(|d| d.lrclist)
            .ok_or(LyricError::MissingLines)?;

        fs::write(dest, format_timed_lines(&lines)).await?;
        debug!("Wrote {} lyric lines to {}", lines.len(), dest.display());
        Ok(())
    }
}

/// Writes a single LRC blob, or a placeholder line when it is empty
pub struct BlobLyric;

/// The provider's lyric, or `[00:00.00]{title}` when there is none
pub fn blob_or_placeholder(lyric: Option<String>, title: &str) -> String {
    match lyric {
        Some(text) if !text.is_empty() => text,
        _ => format!("[00:00.00]{}", title),
    }
}

#[async_trait]
impl LyricFetcher for BlobLyric {
    async fn fetch(
        &self,
        client: &Client,
        url: &str,
        title: &str,
        dest: &Path,
    ) -> Result<(), LyricError> {
        let body = get_ok(client, url).await?.bytes().await?;
        let payload: WangyiLyricResponse = serde_json::from_slice(&body)?;
        let lyric = payload.lrc.and_then(|lrc| lrc.lyric);

        fs::write(dest, blob_or_placeholder(lyric, title)).await?;
        debug!("Wrote lyric blob to {}", dest.display());
        Ok(())
    }
}
