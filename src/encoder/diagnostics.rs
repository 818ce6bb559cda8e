//! Parsing of encoder diagnostic output
//!
//! ffmpeg writes a running status line to stderr (`... time=00:01:23.45 ...`).
//! We keep a bounded tail of that stream for error reports and turn the
//! timestamps into periodic progress logs.

use regex::Regex;
use std::sync::LazyLock;

/// Characters of diagnostic output kept for error reports
pub const DIAGNOSTIC_TAIL_CHARS: usize = 500;

/// Bytes buffered from stderr; comfortably more than [`DIAGNOSTIC_TAIL_CHARS`]
const TAIL_BUFFER_BYTES: usize = 8 * 1024;

/// Seconds of encoded media between progress log lines
const PROGRESS_STEP_SECS: f64 = 5.0;

static TIME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d+):(\d+(?:\.\d+)?)").ok());

/// Extract the last `time=HH:MM:SS.ss` position in `text`, in seconds
pub fn parse_progress_seconds(text: &str) -> Option<f64> {
    let pattern = TIME_PATTERN.as_ref()?;
    let caps = pattern.captures_iter(text).last()?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Bounded buffer holding the most recent diagnostic output
#[derive(Debug, Default)]
pub struct DiagnosticTail {
    buf: Vec<u8>,
}

impl DiagnosticTail {
    /// Create an empty tail
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, discarding the oldest bytes beyond the buffer size
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > TAIL_BUFFER_BYTES {
            let excess = self.buf.len() - TAIL_BUFFER_BYTES;
            self.buf.drain(..excess);
        }
    }

    /// The last [`DIAGNOSTIC_TAIL_CHARS`] characters, lossily decoded
    pub fn summary(&self) -> String {
        let text = String::from_utf8_lossy(&self.buf);
        crate::utils::tail_chars(text.trim_end(), DIAGNOSTIC_TAIL_CHARS).to_string()
    }
}

/// Rate-limits progress reporting to one line per [`PROGRESS_STEP_SECS`] of media
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_reported: Option<f64>,
}

impl ProgressTracker {
    /// Create a tracker that has reported nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a stderr chunk; returns the position to report, if one is due
    pub fn observe(&mut self, chunk: &str) -> Option<f64> {
        let position = parse_progress_seconds(chunk)?;
        let due = match self.last_reported {
            None => true,
            Some(last) => position - last >= PROGRESS_STEP_SECS,
        };
        if due {
            self.last_reported = Some(position);
            Some(position)
        } else {
            None
        }
    }
}
