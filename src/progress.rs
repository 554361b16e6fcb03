//! User-facing progress channel.
//!
//! Progress is an append-only stream of human-readable lines, kept separate
//! from the structured `tracing` log. Front ends implement [`ProgressSink`]
//! to surface status wherever they render output.

use std::sync::Mutex;

/// Append-only, line-at-a-time message sink.
pub trait ProgressSink: Send + Sync {
    /// Emits one progress line.
    fn emit(&self, line: &str);
}

/// Writes each progress line to stdout.
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{line}");
    }
}

/// Discards all progress lines.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _line: &str) {}
}

/// Collects progress lines in memory.
///
/// Used by tests and by embedders that render progress themselves.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every line emitted so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
