//! Per-song progress display

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Largest jump a failed bar makes per tick
const FAILED_STEP: u64 = 49_999;
/// Tick interval of the failure animation
const FAILED_TICK: Duration = Duration::from_millis(3);

/// Handle of one task in a [`ProgressSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

/// Receives transfer updates for every task of a batch
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Add a task; tasks render in creation order
    fn create_task(&self, total: u64, label: &str) -> TaskId;

    /// Replace the expected size once the real one is known
    fn set_total(&self, id: TaskId, total: u64);

    fn update(&self, id: TaskId, transferred: u64);

    /// The task finished successfully
    fn finish(&self, id: TaskId);

    /// Show the task as abandoned and run it to full width in the
    /// background. Purely cosmetic.
    fn mark_failed(&self, id: TaskId);

    /// Wait for running failure animations
    async fn settle(&self);
}

fn bar_style(color: &str) -> ProgressStyle {
    let template = format!(
        "[{{bar:30.{}/yellow}}] | {{msg}} | {{bytes}}/{{total_bytes}}",
        color
    );
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##")
}

/// Terminal renderer built on an `indicatif` multi-bar
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
    animations: Mutex<Vec<JoinHandle<()>>>,
}

impl TerminalProgress {
    /// Render to stderr
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Track progress without drawing anything
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(Vec::new()),
            animations: Mutex::new(Vec::new()),
        }
    }

    /// Underlying multi-bar, used to print log lines above the bars
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }

    fn bars(&self) -> MutexGuard<'_, Vec<ProgressBar>> {
        self.bars.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bar(&self, id: TaskId) -> Option<ProgressBar> {
        self.bars().get(id.0).cloned()
    }

    /// Drop every bar from the display, e.g. when the batch aborts early
    pub fn clear(&self) {
        for bar in self.bars().iter().filter(|bar| !bar.is_finished()) {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    /// Current `(position, length)` of a task
    #[cfg(test)]
    pub fn position(&self, id: TaskId) -> Option<(u64, u64)> {
        self.bar(id)
            .map(|bar| (bar.position(), bar.length().unwrap_or(0)))
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressSink for TerminalProgress {
    fn create_task(&self, total: u64, label: &str) -> TaskId {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(bar_style("green"));
        bar.set_message(label.to_string());

        let mut bars = self.bars();
        bars.push(bar);
        TaskId(bars.len() - 1)
    }

    fn set_total(&self, id: TaskId, total: u64) {
        if let Some(bar) = self.bar(id) {
            bar.set_length(total);
        }
    }

    fn update(&self, id: TaskId, transferred: u64) {
        if let Some(bar) = self.bar(id) {
            bar.set_position(transferred);
        }
    }

    fn finish(&self, id: TaskId) {
        if let Some(bar) = self.bar(id) {
            bar.finish();
        }
    }

    fn mark_failed(&self, id: TaskId) {
        let Some(bar) = self.bar(id) else {
            return;
        };
        bar.set_style(bar_style("red"));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FAILED_TICK);
            loop {
                ticker.tick().await;
                let remaining = bar.length().unwrap_or(0).saturating_sub(bar.position());
                if remaining > FAILED_STEP {
                    bar.inc(FAILED_STEP);
                } else {
                    bar.inc(remaining);
                    bar.finish();
                    break;
                }
            }
        });

        self.animations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    async fn settle(&self) {
        let handles: Vec<_> = self
            .animations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        debug!("Waiting for {} failure animations", handles.len());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
