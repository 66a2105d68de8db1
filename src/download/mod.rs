//! Download engine module

pub mod cleanup;
pub mod engine;
pub mod error;
pub mod lyrics;
pub mod names;
pub mod progress;
pub mod tracker;
pub mod worker;

pub use cleanup::{spawn_signal_listener, CleanupGuard};
pub use engine::{BatchDownloader, BatchReport};
pub use progress::{ProgressSink, TerminalProgress};
pub use tracker::FailureTracker;
