//! Song selection models
//!
//! The upstream provider query hands over a list of already-resolved songs.
//! Field names follow that producer (`songName`, `songDownloadUrl`, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::utils::sanitize_song_name;

/// Lyric provider, selects the lyric payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Raw LRC text stream
    Migu,
    /// JSON list of timed lines
    Kuwo,
    /// JSON with a single LRC blob
    Wangyi,
}

/// Per-song options as sent by the provider query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSongOptions {
    pub lyric: Option<bool>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub wangyi: bool,
    #[serde(default)]
    pub migu: bool,
    #[serde(default)]
    pub kuwo: bool,
}

impl RawSongOptions {
    /// Fold the provider flags into a single provider.
    ///
    /// Flags are mutually exclusive in practice; when several are set the
    /// first of migu, kuwo, wangyi wins.
    pub fn provider(&self) -> Option<Provider> {
        if self.migu {
            Some(Provider::Migu)
        } else if self.kuwo {
            Some(Provider::Kuwo)
        } else if self.wangyi {
            Some(Provider::Wangyi)
        } else {
            None
        }
    }
}

/// A song record as it appears in the selection file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSong {
    pub song_name: String,
    pub song_download_url: String,
    #[serde(default)]
    pub lyric_download_url: Option<String>,
    #[serde(default)]
    pub song_size: u64,
    #[serde(default)]
    pub options: RawSongOptions,
}

/// Effective options for one song after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongOptions {
    pub lyric: bool,
    pub path: PathBuf,
    pub provider: Option<Provider>,
}

/// A validated song, immutable once created
#[derive(Debug, Clone)]
pub struct SongInfo {
    pub song_name: String,
    pub song_download_url: String,
    pub lyric_download_url: Option<String>,
    pub song_size: u64,
    pub options: SongOptions,
}

/// Defaults filled into songs whose options omit a value
#[derive(Debug, Clone)]
pub struct SongDefaults {
    pub lyric: bool,
    pub path: PathBuf,
}

impl SongInfo {
    /// Validate a raw record and apply defaults
    pub fn from_raw(raw: RawSong, defaults: &SongDefaults) -> Result<Self> {
        let song_name = sanitize_song_name(&raw.song_name);
        if song_name.is_empty() {
            anyhow::bail!("Song name is empty");
        }
        if !song_name.contains('.') {
            anyhow::bail!("Song name '{}' has no file extension", song_name);
        }

        let url = url::Url::parse(&raw.song_download_url)
            .with_context(|| format!("Invalid download URL for '{}'", song_name))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "Unsupported URL scheme '{}' for '{}'",
                url.scheme(),
                song_name
            );
        }

        let provider = raw.options.provider();
        Ok(Self {
            song_name,
            song_download_url: raw.song_download_url,
            lyric_download_url: raw.lyric_download_url.filter(|u| !u.is_empty()),
            song_size: raw.song_size,
            options: SongOptions {
                lyric: raw.options.lyric.unwrap_or(defaults.lyric),
                path: raw.options.path.unwrap_or_else(|| defaults.path.clone()),
                provider,
            },
        })
    }

    /// Whether the lyric branch should run for this song
    pub fn wants_lyric(&self) -> bool {
        self.options.lyric && self.options.provider.is_some()
    }
}

/// Selection file layout: either a bare array or `{ "songs": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectionFile {
    List(Vec<RawSong>),
    Wrapped { songs: Vec<RawSong> },
}

/// The list of songs chosen for one download run
#[derive(Debug, Clone, Default)]
pub struct SongSelection {
    pub songs: Vec<SongInfo>,
}

impl SongSelection {
    /// Load a selection from a file, or stdin when `path` is `None` or `-`
    pub fn load(path: Option<&Path>, defaults: &SongDefaults) -> Result<Self> {
        let contents = match path {
            Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read selection from {:?}", p))?,
            _ => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read selection from stdin")?;
                buf
            }
        };

        Self::parse(&contents, defaults)
    }

    /// Parse selection JSON
    pub fn parse(contents: &str, defaults: &SongDefaults) -> Result<Self> {
        let file: SelectionFile =
            serde_json::from_str(contents).context("Failed to parse song selection")?;
        let raw = match file {
            SelectionFile::List(songs) | SelectionFile::Wrapped { songs } => songs,
        };

        let songs = raw
            .into_iter()
            .enumerate()
            .map(|(idx, song)| {
                SongInfo::from_raw(song, defaults)
                    .with_context(|| format!("Invalid song at index {}", idx))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} songs from selection", songs.len());
        Ok(Self { songs })
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.songs.len()
    }
}

// Lyric payloads returned by the providers

/// Kuwo: `{ "data": { "lrclist": [{ "time": "12.34", "lineLyric": "..." }] } }`
#[derive(Debug, Clone, Deserialize)]
pub struct KuwoLyricResponse {
    pub data: Option<KuwoLyricData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KuwoLyricData {
    pub lrclist: Option<Vec<KuwoLyricLine>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KuwoLyricLine {
    pub time: LineTime,
    #[serde(rename = "lineLyric", default)]
    pub line_lyric: String,
}

/// Kuwo sends the timestamp as a string, some mirrors as a number
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LineTime {
    Text(String),
    Seconds(f64),
}

impl std::fmt::Display for LineTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineTime::Text(s) => f.write_str(s),
            LineTime::Seconds(n) => write!(f, "{}", n),
        }
    }
}

/// Wangyi: `{ "lrc": { "lyric": "[00:01.00]..." } }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WangyiLyricResponse {
    #[serde(default)]
    pub lrc: Option<WangyiLrc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WangyiLrc {
    #[serde(default)]
    pub lyric: Option<String>,
}
