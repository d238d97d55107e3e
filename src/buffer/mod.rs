//! Append-only capture log for subprocess output
//!
//! Every byte the subprocess produces lands in this log, in order, for the
//! lifetime of one spawned command. A single read cursor tracks how much of
//! the log has already been delivered to the caller; the cursor only ever
//! moves forward and never past the end of the log. Whether the backing
//! store is a pipe, a ring buffer or a file is hidden behind this type.

use bytes::BytesMut;

/// Raw output log with a monotone read cursor.
pub struct CaptureLog {
    log: BytesMut,
    cursor: usize,
}

impl CaptureLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            log: BytesMut::new(),
            cursor: 0,
        }
    }

    /// Record bytes produced by the subprocess.
    pub fn append(&mut self, data: &[u8]) {
        self.log.extend_from_slice(data);
    }

    /// The portion of the log not yet delivered to the caller.
    pub fn unread(&self) -> &[u8] {
        &self.log[self.cursor..]
    }

    /// Advance the cursor by `n` bytes of the unread region.
    ///
    /// Advancing past the end of the log is clamped; the cursor never
    /// regresses.
    pub fn advance(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.log.len());
    }

    /// Take everything unread, advancing the cursor to the end of the log.
    ///
    /// Calling this twice with no intervening `append` returns an empty
    /// slice the second time; previously delivered bytes are never
    /// re-returned.
    pub fn take_unread(&mut self) -> Vec<u8> {
        let chunk = self.log[self.cursor..].to_vec();
        self.cursor = self.log.len();
        chunk
    }

    /// Current cursor position (bytes already delivered).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total bytes recorded so far.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Discard the log and reset the cursor. Used when the session ends.
    pub fn clear(&mut self) {
        self.log.clear();
        self.cursor = 0;
    }
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new()
    }
}
