//! Result codes and error types for wait operations

mod error;

pub use error::{PatternError, RemoteError};

/// Result code of a `wait` call.
///
/// A wait finishes in one of three ways: a reaction declared the wait done
/// (`Done`, or `Code` when the reaction supplied its own value), the timeout
/// elapsed, or the subprocess closed its output stream. The latter two are
/// always legal "no match" terminations and are reported here rather than as
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// A reaction stopped the wait and reported success.
    Done,
    /// A reaction stopped the wait with a caller-defined code.
    Code(i64),
    /// The configured timeout elapsed with no terminating match.
    Timeout,
    /// The subprocess ended its output stream.
    Eof,
}

impl WaitStatus {
    /// True when a reaction completed the wait (either variant).
    pub fn is_done(self) -> bool {
        matches!(self, WaitStatus::Done | WaitStatus::Code(_))
    }

    /// True when the wait gave up after the configured timeout.
    pub fn is_timeout(self) -> bool {
        matches!(self, WaitStatus::Timeout)
    }

    /// True when the subprocess output stream ended during the wait.
    pub fn is_eof(self) -> bool {
        matches!(self, WaitStatus::Eof)
    }
}
