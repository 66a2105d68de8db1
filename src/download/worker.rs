//! Single-song download lifecycle
//!
//! `Init -> Lyric (optional) -> Streaming -> Done | Failed`
//!
//! Init happens in [`DownloadWorker::prepare`], which the engine calls for
//! every song in list order before any transfer starts. [`DownloadWorker::run`]
//! then drives the lyric and audio subtasks side by side.

use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::error::{BatchError, LyricError, TransferError};
use super::lyrics::fetcher_for;
use super::names::{split_name, NameResolver};
use super::progress::{ProgressSink, TaskId};
use super::tracker::FailureTracker;
use crate::song::SongInfo;

/// Shared handles every worker of a batch uses
#[derive(Clone)]
pub struct WorkerContext {
    pub client: Client,
    pub progress: Arc<dyn ProgressSink>,
    pub tracker: FailureTracker,
}

/// Output locations of one song, fixed at preparation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    pub song_name: String,
    pub song_path: PathBuf,
    pub lrc_path: PathBuf,
}

impl ResolvedTask {
    pub fn new(dir: &Path, song_name: String) -> Self {
        let (stem, _) = split_name(&song_name);
        let lrc_path = dir.join(format!("{}.lrc", stem));
        Self {
            song_path: dir.join(&song_name),
            lrc_path,
            song_name,
        }
    }

    /// File name without extension, used as the lyric title
    pub fn stem(&self) -> &str {
        split_name(&self.song_name).0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Init,
    Streaming,
    Done,
    Failed,
}

/// Terminal state of a song
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Done,
    Failed(String),
}

/// What a worker reports back to the engine
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub song_name: String,
    pub state: TaskState,
    /// Set when the lyric could not be saved; never affects `state`
    pub lyric_warning: Option<String>,
}

impl TaskOutcome {
    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }
}

/// Downloads one song and its optional lyric
pub struct DownloadWorker {
    song: SongInfo,
    task: ResolvedTask,
    progress_id: TaskId,
    ctx: WorkerContext,
    state: WorkerState,
    /// An earlier song in the batch writes the same lyric file
    lyric_shared: bool,
}

impl DownloadWorker {
    /// Resolve the output name, check the target and register the task
    ///
    /// An existing output file aborts the whole batch.
    pub fn prepare(
        song: SongInfo,
        names: &mut NameResolver,
        ctx: WorkerContext,
    ) -> Result<Self, BatchError> {
        let song_name = names.resolve(&song.song_name);
        let task = ResolvedTask::new(&song.options.path, song_name);

        if task.song_path.exists() {
            return Err(BatchError::OutputExists(task.song_path));
        }

        let lyric_shared = song.wants_lyric() && !names.claim_lyric(&task.lrc_path);
        let progress_id = ctx.progress.create_task(song.song_size, &task.song_name);
        ctx.tracker.register(&task.song_path);
        debug!("Prepared {} -> {}", song.song_name, task.song_path.display());

        Ok(Self {
            song,
            task,
            progress_id,
            ctx,
            state: WorkerState::Init,
            lyric_shared,
        })
    }

    /// Run lyric and audio downloads to completion; never fails
    pub async fn run(mut self) -> TaskOutcome {
        self.state = WorkerState::Streaming;
        let (lyric_warning, audio) = tokio::join!(self.fetch_lyric(), self.stream_audio());

        match audio {
            Ok(transferred) => self.complete(transferred),
            Err(err) => self.fail(&err),
        }

        TaskOutcome {
            song_name: self.task.song_name.clone(),
            state: match self.state {
                WorkerState::Done => TaskState::Done,
                _ => TaskState::Failed(self.failure_message()),
            },
            lyric_warning,
        }
    }

    async fn fetch_lyric(&self) -> Option<String> {
        if !self.song.wants_lyric() {
            return None;
        }
        let provider = self.song.options.provider?;

        let result = match &self.song.lyric_download_url {
            _ if self.lyric_shared => Err(LyricError::Shared(self.task.lrc_path.clone())),
            Some(url) => {
                fetcher_for(provider)
                    .fetch(&self.ctx.client, url, self.task.stem(), &self.task.lrc_path)
                    .await
            }
            None => Err(LyricError::MissingUrl),
        };

        match result {
            Ok(()) => None,
            Err(err) => {
                warn!("Lyric for {} not saved: {}", self.task.song_name, err);
                Some(err.to_string())
            }
        }
    }

    /// Stream the audio body to disk, returning the byte count
    async fn stream_audio(&self) -> Result<u64, TransferError> {
        let response = self
            .ctx
            .client
            .get(&self.song.song_download_url)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransferError::Status(response.status()));
        }

        if self.song.song_size == 0 {
            if let Some(len) = response.content_length() {
                self.ctx.progress.set_total(self.progress_id, len);
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.task.song_path)
            .await?;
        self.ctx.tracker.mark_created(&self.task.song_path);

        let mut transferred = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            transferred += chunk.len() as u64;
            self.ctx.progress.update(self.progress_id, transferred);
        }
        file.flush().await?;

        Ok(transferred)
    }

    fn complete(&mut self, transferred: u64) {
        if self.state != WorkerState::Streaming {
            return;
        }
        self.state = WorkerState::Done;
        self.ctx.tracker.complete(&self.task.song_path);
        self.ctx.progress.finish(self.progress_id);
        debug!("Downloaded {} ({} bytes)", self.task.song_name, transferred);
    }

    /// Record the failure once; later calls are ignored
    fn fail(&mut self, err: &TransferError) {
        if self.state == WorkerState::Failed {
            return;
        }
        self.state = WorkerState::Failed;
        self.ctx
            .tracker
            .record_failure(&self.task.song_path, err.to_string());
        self.ctx.progress.mark_failed(self.progress_id);
    }

    fn failure_message(&self) -> String {
        self.ctx
            .tracker
            .snapshot()
            .into_iter()
            .find(|e| e.path == self.task.song_path)
            .map(|e| e.error)
            .unwrap_or_default()
    }
}

/// Create `dir` (not its parents) unless it already exists
pub async fn ensure_dir(dir: &Path) -> Result<(), BatchError> {
    if fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    match fs::create_dir(dir).await {
        Ok(()) => {
            debug!("Created directory {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(BatchError::CreateDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
