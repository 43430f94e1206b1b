//! Status sinks.
//!
//! Diagnostic lines from the control loop and replies from the terminal
//! commands are written through a `StatusSink`.

use brake_common::hal::driver::StatusSink;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Forwards every line to `tracing` at INFO under the `status` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn report(&self, line: &str) {
        info!(target: "status", "{line}");
    }
}

/// Writes lines to stdout, for interactive terminal sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn report(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout only loses diagnostics.
        let _ = writeln!(out, "{line}");
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line reported so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every line reported so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl StatusSink for BufferSink {
    fn report(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_collects_and_drains() {
        let sink = BufferSink::new();
        sink.report("ok");
        sink.report("OFF");
        assert_eq!(sink.lines(), vec!["ok", "OFF"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.lines().is_empty());
    }
}
