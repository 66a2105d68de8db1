//! Progress-aware logging
//!
//! While download bars are on screen, a plain stderr log line would be drawn
//! over by the next redraw. Log output is routed through the active
//! `MultiProgress` instead, which hides the bars, prints, and redraws.

use indicatif::MultiProgress;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// Progress display currently owning the terminal, if any
static ACTIVE_DISPLAY: Mutex<Option<MultiProgress>> = Mutex::new(None);

/// Route log output through `multi` until [`detach_display`] is called
pub fn attach_display(multi: &MultiProgress) {
    let mut active = ACTIVE_DISPLAY.lock().unwrap_or_else(|e| e.into_inner());
    *active = Some(multi.clone());
}

/// Go back to writing log lines straight to stderr
pub fn detach_display() {
    let mut active = ACTIVE_DISPLAY.lock().unwrap_or_else(|e| e.into_inner());
    *active = None;
}

fn active_display() -> Option<MultiProgress> {
    ACTIVE_DISPLAY
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// `MakeWriter` for the fmt layer that keeps progress bars intact
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressAwareMakeWriter;

impl<'a> MakeWriter<'a> for ProgressAwareMakeWriter {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        EventWriter { buf: Vec::new() }
    }
}

/// Buffers one formatted event and emits it on drop
pub struct EventWriter {
    buf: Vec<u8>,
}

impl Write for EventWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let emit = |buf: &[u8]| {
            let _ = io::stderr().lock().write_all(buf);
        };
        match active_display() {
            Some(multi) => multi.suspend(|| emit(&self.buf)),
            None => emit(&self.buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    #[test]
    fn test_attach_and_detach() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        attach_display(&multi);
        assert!(active_display().is_some());

        let mut writer = ProgressAwareMakeWriter.make_writer();
        writer.write_all(b"").unwrap();
        drop(writer);

        detach_display();
        assert!(active_display().is_none());
    }
}
