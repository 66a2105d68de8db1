//! Batch download orchestration

use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::error::BatchError;
use super::names::NameResolver;
use super::progress::ProgressSink;
use super::tracker::{FailureTracker, TrackedPath};
use super::worker::{ensure_dir, DownloadWorker, TaskOutcome, TaskState, WorkerContext};
use crate::song::SongInfo;

/// Result of a finished batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub total: usize,
    /// Tracker contents once every worker settled, in registration order
    pub failures: Vec<TrackedPath>,
    pub outcomes: Vec<TaskOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// `"1. name.mp3: error"` per failed song
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let name = entry
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| entry.path.display().to_string());
                format!("{}. {}: {}", idx + 1, name, entry.error)
            })
            .collect()
    }

    /// `(song name, reason)` for every lyric that was not saved
    pub fn lyric_warnings(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.lyric_warning
                    .as_deref()
                    .map(|w| (o.song_name.as_str(), w))
            })
            .collect()
    }
}

/// Runs one worker per song and collects the results
pub struct BatchDownloader {
    ctx: WorkerContext,
    /// Max concurrent workers, `None` starts every song at once
    parallel: Option<usize>,
}

impl BatchDownloader {
    pub fn new(
        client: Client,
        progress: Arc<dyn ProgressSink>,
        tracker: FailureTracker,
        parallel: Option<usize>,
    ) -> Self {
        Self {
            ctx: WorkerContext {
                client,
                progress,
                tracker,
            },
            parallel,
        }
    }

    /// Download every song; individual failures end up in the report
    ///
    /// Returns an error only for problems that abort the whole batch: an
    /// empty selection or an output file that already exists.
    pub async fn run(&self, songs: Vec<SongInfo>) -> Result<BatchReport, BatchError> {
        if songs.is_empty() {
            return Err(BatchError::EmptySelection);
        }
        let total = songs.len();
        debug!("Starting download of {} songs", total);

        let workers = self.prepare(songs).await?;

        let limit = self.parallel.unwrap_or(total).max(1);
        debug!("Running {} workers, {} at a time", workers.len(), limit);

        let outcomes: Vec<TaskOutcome> = stream::iter(workers)
            .map(|worker| worker.run())
            .buffer_unordered(limit)
            .collect()
            .await;

        self.ctx.progress.settle().await;

        let report = BatchReport {
            total,
            failures: self.ctx.tracker.snapshot(),
            outcomes,
        };
        for outcome in &report.outcomes {
            if let TaskState::Failed(reason) = &outcome.state {
                debug!("{} failed: {}", outcome.song_name, reason);
            }
        }
        debug_assert_eq!(
            report.outcomes.iter().filter(|o| o.is_done()).count(),
            report.succeeded(),
            "finished songs must have left the tracker"
        );
        debug!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Prepare workers in list order so duplicate names resolve
    /// deterministically
    async fn prepare(&self, songs: Vec<SongInfo>) -> Result<Vec<DownloadWorker>, BatchError> {
        let mut names = NameResolver::new();
        let mut created: HashSet<&Path> = HashSet::new();
        let mut workers = Vec::with_capacity(songs.len());

        for song in &songs {
            let worker = DownloadWorker::prepare(song.clone(), &mut names, self.ctx.clone())?;
            if created.insert(song.options.path.as_path()) {
                ensure_dir(&song.options.path).await?;
            }
            workers.push(worker);
        }

        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::testing::RecordingProgress;
    use crate::song::{Provider, SongOptions};
    use crate::test_support::{Route, TestServer};
    use std::path::PathBuf;

    fn song(name: &str, url: String, dir: &Path) -> SongInfo {
        SongInfo {
            song_name: name.to_string(),
            song_download_url: url,
            lyric_download_url: None,
            song_size: 0,
            options: SongOptions {
                lyric: false,
                path: dir.to_path_buf(),
                provider: None,
            },
        }
    }

    fn downloader(tracker: &FailureTracker) -> (BatchDownloader, Arc<RecordingProgress>) {
        let progress = Arc::new(RecordingProgress::default());
        let engine = BatchDownloader::new(Client::new(), progress.clone(), tracker.clone(), None);
        (engine, progress)
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);
        assert!(matches!(
            engine.run(vec![]).await,
            Err(BatchError::EmptySelection)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_names_are_disambiguated() {
        let server = TestServer::start(vec![
            ("/1", Route::ok(b"one".to_vec())),
            ("/2", Route::ok(b"two".to_vec())),
            ("/3", Route::ok(b"three".to_vec())),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let tracker = FailureTracker::new();
        let (engine, progress) = downloader(&tracker);

        let report = engine
            .run(vec![
                song("track.mp3", server.url("/1"), dir.path()),
                song("track.mp3", server.url("/2"), dir.path()),
                song("other.mp3", server.url("/3"), dir.path()),
            ])
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(std::fs::read(dir.path().join("track.mp3")).unwrap(), b"one");
        assert_eq!(std::fs::read(dir.path().join("track(1).mp3")).unwrap(), b"two");
        assert_eq!(std::fs::read(dir.path().join("other.mp3")).unwrap(), b"three");
        assert_eq!(
            progress.labels(),
            vec!["track.mp3", "track(1).mp3", "other.mp3"]
        );
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let server = TestServer::start(vec![
            ("/ok1", Route::ok(vec![1u8; 2048])),
            ("/cut", Route::cut_off(vec![2u8; 8192], 512)),
            ("/ok2", Route::ok(vec![3u8; 2048])),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);

        let report = engine
            .run(vec![
                song("a.mp3", server.url("/ok1"), dir.path()),
                song("b.mp3", server.url("/cut"), dir.path()),
                song("c.mp3", server.url("/ok2"), dir.path()),
            ])
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].path, dir.path().join("b.mp3"));

        let lines = report.failure_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("1. b.mp3: "));
        assert!(lines[0].len() > "1. b.mp3: ".len());

        let done = report.outcomes.iter().filter(|o| o.is_done()).count();
        assert_eq!(done, report.total - tracker.len());
        for outcome in &report.outcomes {
            match &outcome.state {
                TaskState::Done => assert_ne!(outcome.song_name, "b.mp3"),
                TaskState::Failed(_) => assert_eq!(outcome.song_name, "b.mp3"),
            }
        }
    }

    #[tokio::test]
    async fn test_existing_file_aborts_before_writing() {
        let server = TestServer::start(vec![("/x", Route::ok(b"new".to_vec()))]).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("taken.mp3"), b"old").unwrap();
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);

        let result = engine
            .run(vec![
                song("fresh.mp3", server.url("/x"), dir.path()),
                song("taken.mp3", server.url("/x"), dir.path()),
            ])
            .await;

        match result {
            Err(BatchError::OutputExists(path)) => {
                assert_eq!(path, dir.path().join("taken.mp3"))
            }
            other => panic!("expected OutputExists, got {:?}", other.map(|r| r.total)),
        }
        assert_eq!(std::fs::read(dir.path().join("taken.mp3")).unwrap(), b"old");
        assert!(!dir.path().join("fresh.mp3").exists());
    }

    #[tokio::test]
    async fn test_target_directory_is_created() {
        let server = TestServer::start(vec![("/x", Route::ok(b"data".to_vec()))]).await;
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("downloads");
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);

        engine
            .run(vec![song("a.mp3", server.url("/x"), &target)])
            .await
            .unwrap();

        assert!(target.join("a.mp3").exists());
    }

    #[tokio::test]
    async fn test_lyric_warnings_are_reported_separately() {
        let server = TestServer::start(vec![("/x", Route::ok(b"data".to_vec()))]).await;
        let dir = tempfile::tempdir().unwrap();
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);

        let mut info = song("a.mp3", server.url("/x"), dir.path());
        info.options.lyric = true;
        info.options.provider = Some(Provider::Kuwo);

        let report = engine.run(vec![info]).await.unwrap();

        assert_eq!(report.failed(), 0);
        assert_eq!(
            report.lyric_warnings(),
            vec![("a.mp3", "no lyric URL provided")]
        );
    }

    #[tokio::test]
    async fn test_shared_lyric_file_written_by_first_song_only() {
        let server = TestServer::start(vec![
            ("/audio", Route::ok(b"data".to_vec())),
            ("/lrc1", Route::ok(r#"{"data":{"lrclist":[{"time":"0.0","lineLyric":"mp3"}]}}"#)),
            ("/lrc2", Route::ok(r#"{"data":{"lrclist":[{"time":"0.0","lineLyric":"flac"}]}}"#)),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let tracker = FailureTracker::new();
        let (engine, _) = downloader(&tracker);

        let songs = [("a.mp3", "/lrc1"), ("a.flac", "/lrc2")].map(|(name, lrc)| {
            let mut info = song(name, server.url("/audio"), dir.path());
            info.options.lyric = true;
            info.options.provider = Some(Provider::Kuwo);
            info.lyric_download_url = Some(server.url(lrc));
            info
        });

        let report = engine.run(Vec::from(songs)).await.unwrap();

        assert_eq!(report.succeeded(), 2);
        let lrc = dir.path().join("a.lrc");
        assert_eq!(std::fs::read_to_string(&lrc).unwrap(), "[0.0] mp3\n");
        let expected = format!("{} is the lyric file of an earlier song", lrc.display());
        assert_eq!(report.lyric_warnings(), vec![("a.flac", expected.as_str())]);
    }

    #[test]
    fn test_failure_lines_use_basename() {
        let report = BatchReport {
            total: 3,
            failures: vec![
                TrackedPath {
                    path: PathBuf::from("/music/x.mp3"),
                    error: "timeout".into(),
                    created: true,
                },
                TrackedPath {
                    path: PathBuf::from("/music/y.mp3"),
                    error: String::new(),
                    created: false,
                },
            ],
            outcomes: vec![],
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(
            report.failure_lines(),
            vec!["1. x.mp3: timeout", "2. y.mp3: "]
        );
    }
}
