//! Output name collision resolution

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hands out collision-free output names within one run
///
/// Repeats are counted per *requested* name: the first `track.mp3` is kept,
/// the next ones become `track(1).mp3`, `track(2).mp3`, ...
#[derive(Debug, Default)]
pub struct NameResolver {
    occurrences: HashMap<String, u32>,
    assigned: HashSet<String>,
    lyric_files: HashSet<PathBuf>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `song_name` to a name no earlier call has returned
    pub fn resolve(&mut self, song_name: &str) -> String {
        let count = self
            .occurrences
            .entry(song_name.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(0);
        let mut candidate = if *count == 0 {
            song_name.to_string()
        } else {
            with_suffix(song_name, *count)
        };

        // A literal "track(1).mp3" in the input can collide with a
        // disambiguated "track.mp3"; keep counting until the name is free.
        while self.assigned.contains(&candidate) {
            let count = self
                .occurrences
                .entry(song_name.to_string())
                .or_insert(0);
            *count += 1;
            candidate = with_suffix(song_name, *count);
        }

        if candidate != song_name {
            debug!("Renamed duplicate {} -> {}", song_name, candidate);
        }
        self.assigned.insert(candidate.clone());
        candidate
    }

    /// Claim `lrc_path` for one song; false if an earlier song holds it
    ///
    /// `a.mp3` and `a.flac` are distinct names but share `a.lrc`.
    pub fn claim_lyric(&mut self, lrc_path: &Path) -> bool {
        self.lyric_files.insert(lrc_path.to_path_buf())
    }
}

/// Split a file name into stem and extension (with the dot)
///
/// Splits on the last dot so `a.b.mp3` keeps `a.b` as its stem. A leading
/// dot alone does not start an extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

fn with_suffix(name: &str, n: u32) -> String {
    let (stem, ext) = split_name(name);
    format!("{}({}){}", stem, n, ext)
}
