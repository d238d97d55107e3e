//! Interactive session engine
//!
//! One [`Session`] owns one spawned subprocess attached to a PTY. A reader
//! pump copies everything the subprocess prints into an append-only
//! [`CaptureLog`](crate::buffer::CaptureLog); the engine's `wait` primitive
//! scans the unread region against an ordered [`PatternSet`] and runs the
//! reaction of the first rule that fires, looping until a reaction declares
//! the wait done, the timeout elapses, or the stream ends.

mod builder;

pub use builder::{SessionBuilder, SessionOptions, WaitOverrides};

use crate::buffer::CaptureLog;
use crate::pattern::{Matcher, PatternSet, Reaction, WaitContext, WaitControl};
use crate::result::{RemoteError, WaitStatus};
use portable_pty::{Child, ExitStatus, MasterPty};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Outcome of one blocking match attempt.
enum Event {
    /// Rule `index` matched at `start..end` of the unread region.
    Rule {
        index: usize,
        start: usize,
        end: usize,
        captures: Vec<String>,
    },
    Timeout,
    Eof,
}

/// Copies subprocess output into a channel from a dedicated thread.
///
/// The PTY bridge offers no peek-without-consuming, so a plain blocking
/// reader owns the stream and every byte it reads is preserved in the
/// channel until the engine drains it; cancelling a wait can never lose
/// output.
pub(crate) fn spawn_reader_pump(
    mut reader: Box<dyn Read + Send>,
) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }
    });
    rx
}

/// A live automated session with a spawned subprocess.
///
/// Exactly one subprocess per session; callers needing concurrency run
/// independent sessions. All reactions execute synchronously on the thread
/// driving `wait`.
///
/// # Examples
///
/// ```no_run
/// use remotectl::{Pattern, PatternSet, Reaction, Session};
///
/// # async fn example() -> Result<(), remotectl::RemoteError> {
/// let mut session = Session::spawn("ssh -l admin gw.example.net")?;
///
/// let mut set = PatternSet::new()
///     .on(Pattern::regex("[Pp]assword:")?, Reaction::SendLine("secret".into()))
///     .expect(Pattern::regex(r"[#$] *$")?);
///
/// let status = session.wait(&mut set).await?;
/// println!("login wait: {status:?}, banner: {}", session.before());
/// # Ok(())
/// # }
/// ```
pub struct Session {
    // Kept alive so the child keeps its controlling terminal.
    _master: Box<dyn MasterPty + Send>,
    child: Option<Box<dyn Child + Send>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    log: CaptureLog,
    output: String,
    before: String,
    last_captures: Vec<String>,
    options: SessionOptions,
    eof_reached: bool,
}

impl Session {
    /// Create a session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command with default options.
    pub fn spawn(command: &str) -> Result<Self, RemoteError> {
        SessionBuilder::new().spawn(command)
    }

    pub(crate) fn from_parts(
        master: Box<dyn MasterPty + Send>,
        child: Box<dyn Child + Send>,
        writer: Arc<Mutex<Box<dyn Write + Send>>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
        log: CaptureLog,
        options: SessionOptions,
    ) -> Self {
        Self {
            _master: master,
            child: Some(child),
            writer,
            rx,
            log,
            output: String::new(),
            before: String::new(),
            last_captures: Vec::new(),
            options,
            eof_reached: false,
        }
    }

    /// The session's stored options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Toggle live stdout mirroring; returns the previous setting.
    pub fn set_log_stdout(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.options.log_stdout, value)
    }

    /// Write raw bytes to the subprocess.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), RemoteError> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| RemoteError::Io(std::io::Error::other(e)))??;

        Ok(())
    }

    /// Write a line to the subprocess; the configured EOL is appended.
    pub async fn write_line(&mut self, line: &str) -> Result<(), RemoteError> {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(self.options.eol.as_bytes());
        self.write(&data).await
    }

    /// Wait for one of the set's rules using the stored options.
    pub async fn wait(&mut self, set: &mut PatternSet) -> Result<WaitStatus, RemoteError> {
        self.wait_with(set, &WaitOverrides::default()).await
    }

    /// Wait for one of the set's rules with per-call overrides.
    ///
    /// Each iteration blocks until some rule matches the unread output, the
    /// timeout elapses, or the stream ends, then captures the text before
    /// the match into the session buffer and runs the rule's reaction. The
    /// timeout is re-armed on every iteration.
    ///
    /// # Errors
    ///
    /// `UnhandledMatch` when a reaction-less non-sentinel rule fires;
    /// pattern compilation and I/O failures propagate. Timeout and
    /// end-of-stream are `Ok` result codes, not errors.
    pub async fn wait_with(
        &mut self,
        set: &mut PatternSet,
        overrides: &WaitOverrides,
    ) -> Result<WaitStatus, RemoteError> {
        let timeout = overrides.timeout.unwrap_or(self.options.timeout);
        let clear = overrides
            .clear_output_on_wait
            .unwrap_or(self.options.clear_output_on_wait);
        let log_stdout = overrides.log_stdout.unwrap_or(self.options.log_stdout);

        if clear {
            self.output.clear();
        }

        let matchers = set.compile()?;

        loop {
            match self.next_event(&matchers, timeout).await {
                Event::Rule {
                    index,
                    start,
                    end,
                    captures,
                } => {
                    let unread = self.log.unread();
                    let before = String::from_utf8_lossy(&unread[..start]).into_owned();
                    let matched = String::from_utf8_lossy(&unread[start..end]).into_owned();
                    self.log.advance(end);
                    self.push_output(&before, log_stdout);
                    self.last_captures = captures;
                    debug!(index, matched = %matched, "pattern fired");

                    match set.reaction_mut(index) {
                        Some(reaction) => {
                            if let Some(status) =
                                self.run_reaction(reaction, &before, &matched).await?
                            {
                                return Ok(status);
                            }
                        }
                        None => {
                            return Err(RemoteError::UnhandledMatch {
                                index,
                                pattern: set.describe(index),
                            });
                        }
                    }
                }
                Event::Timeout => {
                    let chunk = self.log.take_unread();
                    let before = String::from_utf8_lossy(&chunk).into_owned();
                    self.push_output(&before, log_stdout);
                    debug!("wait timed out");

                    match set.timeout_reaction_mut() {
                        Some(reaction) => {
                            if let Some(status) = self.run_reaction(reaction, &before, "").await? {
                                return Ok(status);
                            }
                        }
                        None => return Ok(WaitStatus::Timeout),
                    }
                }
                Event::Eof => {
                    let chunk = self.log.take_unread();
                    let before = String::from_utf8_lossy(&chunk).into_owned();
                    self.push_output(&before, log_stdout);
                    debug!("stream ended during wait");

                    match set.eof_reaction_mut() {
                        Some(reaction) => {
                            if let Some(status) = self.run_reaction(reaction, &before, "").await? {
                                return Ok(status);
                            }
                            // Nothing further will arrive; a reaction that
                            // declines to finish cannot make progress.
                            return Ok(WaitStatus::Eof);
                        }
                        None => return Ok(WaitStatus::Eof),
                    }
                }
            }
        }
    }

    /// Block until a rule matches, the timeout elapses, or the stream ends.
    async fn next_event(
        &mut self,
        matchers: &[(usize, Box<dyn Matcher>)],
        timeout: Duration,
    ) -> Event {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain_pending();

            let unread = self.log.unread();
            for (index, matcher) in matchers {
                if let Some(m) = matcher.find(unread) {
                    return Event::Rule {
                        index: *index,
                        start: m.start,
                        end: m.end,
                        captures: m.captures,
                    };
                }
            }

            if self.eof_reached {
                return Event::Eof;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Event::Timeout;
            }

            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some(chunk)) => {
                    trace!(bytes = chunk.len(), "captured output");
                    self.log.append(&chunk);
                }
                Ok(None) => self.eof_reached = true,
                Err(_) => return Event::Timeout,
            }
        }
    }

    /// Pull already-produced bytes out of the pump channel into the log.
    fn drain_pending(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.log.append(&chunk),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.eof_reached = true;
                    break;
                }
            }
        }
    }

    async fn run_reaction(
        &mut self,
        reaction: &mut Reaction,
        before: &str,
        matched: &str,
    ) -> Result<Option<WaitStatus>, RemoteError> {
        let eol = self.options.eol.clone();
        let mut ctx = WaitContext::new(before, matched, &eol);
        let control = reaction.run(&mut ctx);
        let finished = ctx.finished;
        let writes = std::mem::take(&mut ctx.writes);
        drop(ctx);

        for data in writes {
            self.write(&data).await?;
        }

        Ok(match control {
            WaitControl::Done => Some(WaitStatus::Done),
            WaitControl::Code(code) => Some(WaitStatus::Code(code)),
            WaitControl::Continue if finished => Some(WaitStatus::Done),
            WaitControl::Continue => None,
        })
    }

    fn push_output(&mut self, chunk: &str, log_stdout: bool) {
        self.before.clear();
        self.before.push_str(chunk);
        self.output.push_str(chunk);
        if log_stdout && !chunk.is_empty() {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        }
    }

    /// Deliver output produced since the last capture point.
    ///
    /// Flushes anything the reader pump has buffered, returns the unread
    /// region of the log, and advances the cursor past it. Safe to call
    /// repeatedly with no output available (returns an empty string);
    /// previously delivered bytes are never re-returned.
    pub fn capture_since_last_read(&mut self) -> String {
        self.drain_pending();
        let chunk = self.log.take_unread();
        let text = String::from_utf8_lossy(&chunk).into_owned();
        if self.options.log_stdout && !text.is_empty() {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        text
    }

    /// Output captured before the last match.
    pub fn before(&self) -> &str {
        &self.before
    }

    /// All output accumulated across waits (subject to
    /// `clear_output_on_wait`).
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Reset the accumulated output buffer.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }

    /// Regex capture groups from the last match (index 0 is the full match).
    pub fn last_captures(&self) -> &[String] {
        &self.last_captures
    }

    /// True while the subprocess is still running.
    pub fn is_alive(&mut self) -> Result<bool, RemoteError> {
        match self.child.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(_)) => Ok(false),
                Ok(None) => Ok(true),
                Err(e) => Err(RemoteError::Io(e)),
            },
            None => Err(RemoteError::ProcessExited),
        }
    }

    /// Block until the subprocess exits and return its status.
    ///
    /// Consumes the child handle; later liveness checks fail with
    /// `ProcessExited`.
    pub async fn wait_exit(&mut self) -> Result<ExitStatus, RemoteError> {
        let mut child = self.child.take().ok_or(RemoteError::ProcessExited)?;
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| RemoteError::Io(std::io::Error::other(e)))??;
        Ok(status)
    }

    /// Terminate the subprocess and release the capture log.
    ///
    /// Runs on every disconnect path, including failures, so subprocess
    /// handles and log storage never leak.
    pub async fn end(&mut self) -> Result<(), RemoteError> {
        if let Some(mut child) = self.child.take() {
            let _ = tokio::task::spawn_blocking(move || {
                let _ = child.kill();
                let _ = child.wait();
            })
            .await;
        }
        self.rx.close();
        if self.options.clear_log_on_end {
            self.log.clear();
            self.output.clear();
            self.before.clear();
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Last-resort release when end() was never reached.
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
    }
}
