//! Session configuration and construction

use crate::buffer::CaptureLog;
use crate::result::RemoteError;
use crate::session::{spawn_reader_pump, Session};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default per-wait timeout (in seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default PTY geometry.
const DEFAULT_PTY_ROWS: u16 = 24;
const DEFAULT_PTY_COLS: u16 = 80;

/// Engine configuration.
///
/// Each session takes an immutable copy at construction; per-wait overrides
/// ([`WaitOverrides`]) merge over it for one call without mutating it.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long a single wait cycle may block before reporting
    /// `WaitStatus::Timeout`. Re-armed on every wait iteration.
    pub timeout: Duration,
    /// Line terminator appended by `write_line`.
    pub eol: String,
    /// Reset the accumulated output buffer at the start of every wait.
    pub clear_output_on_wait: bool,
    /// Mirror captured output to stdout as waits progress (debug aid).
    pub log_stdout: bool,
    /// Discard the raw capture log when the session ends.
    pub clear_log_on_end: bool,
    /// PTY rows presented to the subprocess.
    pub pty_rows: u16,
    /// PTY columns presented to the subprocess.
    pub pty_cols: u16,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            eol: "\n".to_string(),
            clear_output_on_wait: true,
            log_stdout: false,
            clear_log_on_end: true,
            pty_rows: DEFAULT_PTY_ROWS,
            pty_cols: DEFAULT_PTY_COLS,
        }
    }
}

/// Per-wait overrides; `None` fields fall back to the session's options.
#[derive(Debug, Clone, Default)]
pub struct WaitOverrides {
    /// Override the wait timeout.
    pub timeout: Option<Duration>,
    /// Override output-buffer clearing for this wait.
    pub clear_output_on_wait: Option<bool>,
    /// Override stdout mirroring for this wait.
    pub log_stdout: Option<bool>,
}

/// Fluent construction of a [`Session`].
///
/// # Examples
///
/// ```no_run
/// use remotectl::Session;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), remotectl::RemoteError> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(30))
///     .eol("\r")
///     .spawn("ssh -l admin gw.example.net")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    options: SessionOptions,
}

impl SessionBuilder {
    /// A builder holding the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole option set.
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the per-wait timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the line terminator used by `write_line`.
    pub fn eol(mut self, eol: impl Into<String>) -> Self {
        self.options.eol = eol.into();
        self
    }

    /// Control whether the output buffer resets on every wait.
    pub fn clear_output_on_wait(mut self, clear: bool) -> Self {
        self.options.clear_output_on_wait = clear;
        self
    }

    /// Mirror captured output to stdout as waits progress.
    pub fn log_stdout(mut self, log: bool) -> Self {
        self.options.log_stdout = log;
        self
    }

    /// Control whether the raw capture log is discarded on `end`.
    pub fn clear_log_on_end(mut self, clear: bool) -> Self {
        self.options.clear_log_on_end = clear;
        self
    }

    /// Set the PTY geometry presented to the subprocess.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.options.pty_rows = rows;
        self.options.pty_cols = cols;
        self
    }

    /// Spawn `command` through the platform shell on a fresh PTY.
    ///
    /// The command runs as a single shell command (`sh -c` on Unix,
    /// `cmd /C` on Windows), so strings produced by the spawn-command
    /// builder execute with their quoting intact.
    ///
    /// # Errors
    ///
    /// Fails when the command is empty, the PTY cannot be created, or the
    /// process cannot be started.
    pub fn spawn(self, command: &str) -> Result<Session, RemoteError> {
        if command.trim().is_empty() {
            return Err(RemoteError::Configuration("no command defined".into()));
        }

        let pty_system = native_pty_system();
        let pty_pair = pty_system
            .openpty(PtySize {
                rows: self.options.pty_rows,
                cols: self.options.pty_cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| RemoteError::Pty(e.to_string()))?;

        tracing::debug!(
            command,
            rows = self.options.pty_rows,
            cols = self.options.pty_cols,
            "spawning subprocess"
        );

        let cmd = shell_command(command);
        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| RemoteError::Spawn(e.to_string()))?;

        // Dropping the slave here is what lets the master reader see EOF
        // once the child exits.
        drop(pty_pair.slave);

        let reader = pty_pair
            .master
            .try_clone_reader()
            .map_err(|e| RemoteError::Pty(e.to_string()))?;
        let writer = pty_pair
            .master
            .take_writer()
            .map_err(|e| RemoteError::Pty(e.to_string()))?;

        let rx = spawn_reader_pump(reader);

        Ok(Session::from_parts(
            pty_pair.master,
            child,
            Arc::new(Mutex::new(writer)),
            rx,
            CaptureLog::new(),
            self.options,
        ))
    }
}

fn shell_command(command: &str) -> CommandBuilder {
    if cfg!(windows) {
        let mut cmd = CommandBuilder::new("cmd");
        cmd.arg("/C");
        cmd.arg(command);
        cmd
    } else {
        let mut cmd = CommandBuilder::new("sh");
        cmd.arg("-c");
        cmd.arg(command);
        cmd
    }
}
