//! Utility functions

pub mod progress_log;
mod sanitize;

pub use progress_log::{attach_display, detach_display, ProgressAwareMakeWriter};
pub use sanitize::sanitize_song_name;
