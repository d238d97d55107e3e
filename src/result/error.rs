//! Error types for remotectl

use crate::result::WaitStatus;
use thiserror::Error;

/// Errors that can occur while driving a remote session.
///
/// Timeout and end-of-stream are deliberately *not* represented here: they
/// are common, expected outcomes of automation against flaky links and are
/// reported as [`WaitStatus`] result codes instead. Callers must check for
/// them explicitly.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// A required option is missing or invalid (no command, no host, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A non-sentinel pattern fired but no reaction was registered for it.
    ///
    /// This is always fatal; it signals an authoring bug in the
    /// [`PatternSet`](crate::PatternSet) handed to `wait`.
    #[error("unhandled match for pattern {index} ({pattern:?})")]
    UnhandledMatch {
        /// Index of the offending rule within its pattern set.
        index: usize,
        /// Human-readable description of the pattern that fired.
        pattern: String,
    },

    /// Login ended without reaching a command prompt.
    ///
    /// Carries the output captured during the attempt for diagnostics.
    #[error("login failed ({status:?})")]
    LoginFailure {
        /// Result code of the login wait (`Done` for a known failure text,
        /// `Timeout`/`Eof` when the link went quiet or dropped).
        status: WaitStatus,
        /// Everything the device printed during the attempt.
        output: String,
    },

    /// A pattern could not be compiled into a matcher.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// An underlying read or write on the subprocess channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PTY creation or manipulation failed.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The spawn command could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(String),

    /// The subprocess handle has already been consumed.
    #[error("process has already exited")]
    ProcessExited,

    /// An operation that needs a live session was called without one.
    #[error("session is not connected")]
    NotConnected,
}

/// Errors raised while compiling a [`Pattern`](crate::Pattern) into a matcher.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The regex source did not parse.
    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// The glob source did not parse.
    #[error("invalid glob: {0}")]
    InvalidGlob(String),

    /// Exact patterns must be non-empty.
    #[error("pattern cannot be empty")]
    EmptyPattern,

    /// TIMEOUT / END_OF_STREAM never participate in text matching.
    #[error("sentinel patterns have no matcher")]
    Sentinel,
}
