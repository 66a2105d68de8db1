//! Removal of unfinished files on exit or interrupt
//!
//! Every path still in the [`FailureTracker`] whose file this run created
//! may hold a partial file. The cleanup routine deletes those files exactly
//! once: when the [`CleanupGuard`] is dropped at the end of a run, or when
//! a termination signal arrives first.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::tracker::FailureTracker;

struct CleanupState {
    tracker: FailureTracker,
    done: AtomicBool,
}

impl CleanupState {
    fn run(&self) -> Vec<PathBuf> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        remove_unfinished(&self.tracker)
    }
}

/// Delete every tracked file this run created, returning the removed paths
pub fn remove_unfinished(tracker: &FailureTracker) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for entry in tracker.snapshot() {
        if !entry.created || !entry.path.exists() {
            continue;
        }
        match std::fs::remove_file(&entry.path) {
            Ok(()) => {
                debug!("Removed unfinished {}", entry.path.display());
                removed.push(entry.path);
            }
            Err(e) => warn!("Could not remove {}: {}", entry.path.display(), e),
        }
    }
    removed
}

/// Runs cleanup when dropped, unless a signal already did
pub struct CleanupGuard {
    state: Arc<CleanupState>,
}

impl CleanupGuard {
    pub fn new(tracker: FailureTracker) -> Self {
        Self {
            state: Arc::new(CleanupState {
                tracker,
                done: AtomicBool::new(false),
            }),
        }
    }

    /// Handle for triggering the same cleanup from elsewhere
    pub fn handle(&self) -> CleanupHandle {
        CleanupHandle {
            state: self.state.clone(),
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let removed = self.state.run();
        if !removed.is_empty() {
            info!("Removed {} unfinished files", removed.len());
        }
    }
}

/// Shared trigger for a [`CleanupGuard`]'s routine
#[derive(Clone)]
pub struct CleanupHandle {
    state: Arc<CleanupState>,
}

impl CleanupHandle {
    pub fn run(&self) -> Vec<PathBuf> {
        self.state.run()
    }
}

/// Termination signal that interrupted the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
    #[cfg(windows)]
    Break,
}

impl Signal {
    /// Conventional `128 + signal number` exit status
    pub fn exit_code(self) -> i32 {
        128 + match self {
            Signal::Interrupt => 2,
            Signal::Terminate => 15,
            Signal::Hangup => 1,
            #[cfg(windows)]
            Signal::Break => 21,
        }
    }
}

/// Installed termination signal handlers
///
/// The OS handlers are registered when this is constructed, so a signal
/// arriving before [`SignalListener::recv`] is first polled is still caught.
#[cfg(unix)]
pub struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())
                .context("failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate())
                .context("failed to install SIGTERM handler")?,
            hangup: signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?,
        })
    }

    /// Wait for the first termination signal
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.interrupt.recv() => Signal::Interrupt,
            _ = self.terminate.recv() => Signal::Terminate,
            _ = self.hangup.recv() => Signal::Hangup,
        }
    }
}

#[cfg(windows)]
pub struct SignalListener {
    ctrl_c: tokio::signal::windows::CtrlC,
    ctrl_break: tokio::signal::windows::CtrlBreak,
}

#[cfg(windows)]
impl SignalListener {
    pub fn install() -> Result<Self> {
        use tokio::signal::windows::{ctrl_break, ctrl_c};

        Ok(Self {
            ctrl_c: ctrl_c().context("failed to install Ctrl-C handler")?,
            ctrl_break: ctrl_break().context("failed to install Ctrl-Break handler")?,
        })
    }

    /// Wait for the first termination signal
    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.ctrl_c.recv() => Signal::Interrupt,
            _ = self.ctrl_break.recv() => Signal::Break,
        }
    }
}

/// Wait for a signal, then run `before_cleanup` and the cleanup routine
async fn clean_up_on_signal<F>(
    listener: &mut SignalListener,
    cleanup: &CleanupHandle,
    before_cleanup: F,
) -> Signal
where
    F: FnOnce(),
{
    let signal = listener.recv().await;
    before_cleanup();
    let removed = cleanup.run();
    info!(
        "Interrupted by {:?}, removed {} unfinished files",
        signal,
        removed.len()
    );
    signal
}

/// Install signal handlers and listen for termination in the background
///
/// Handlers are in place when this returns. On a signal, `before_cleanup`
/// runs (e.g. to clear the progress display), unfinished files are deleted
/// and the process exits.
pub fn spawn_signal_listener<F>(
    cleanup: CleanupHandle,
    before_cleanup: F,
) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut listener = SignalListener::install()?;
    Ok(tokio::spawn(async move {
        let signal = clean_up_on_signal(&mut listener, &cleanup, before_cleanup).await;
        std::process::exit(signal.exit_code());
    }))
}
