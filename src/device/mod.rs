//! Network device automation
//!
//! Builds on the session engine to drive the interactive CLI of routers,
//! switches, and similar devices: spawning the transport, walking the login
//! and privilege-escalation handshakes, and running commands with pager
//! prompts answered automatically.

mod command;
mod normalize;

pub use command::{build_command, shell_quote, Protocol};
pub use normalize::normalize;

use crate::pattern::{Pattern, PatternSet, Reaction, WaitControl};
use crate::result::{RemoteError, WaitStatus};
use crate::session::{Session, SessionBuilder, SessionOptions, WaitOverrides};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Suspends interactive configuration on most devices. `write_line` sends it
/// without a trailing EOL.
pub const CTRL_Z: &str = "\x1a";

/// Prompt that matches an idle shell on generic Unix-ish hosts.
const DEFAULT_PROMPT: &str = "[#$] *$";

/// Prompt covering IOS-style user/exec/config modes.
const CISCO_PROMPT: &str = r"[a-zA-Z0-9._-]+ ?(\(config[^\)]*\))? ?[$#>] ?(\(enable\))? *$";

/// Privilege reached on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AuthLevel {
    /// Not logged in (or login failed).
    #[default]
    Unauthenticated,
    /// Logged in at user level.
    User,
    /// Logged in and privilege-escalated ("enabled").
    Privileged,
}

/// Connection and behavior options for a [`NetworkDevice`].
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Transport used to reach the device.
    pub protocol: Protocol,
    /// Host to connect to.
    pub host: String,
    /// Port, when it differs from the transport default.
    pub port: Option<u16>,
    /// Username passed on the spawn command line.
    pub username: Option<String>,
    /// Extra command-line arguments appended verbatim to the spawn command.
    ///
    /// Trusted operator configuration, not end-user input: the contents are
    /// not shell-escaped (line breaks are rejected at connect time).
    pub extra_args: Option<String>,
    /// Regex marking an idle command prompt.
    pub prompt: String,
    /// Login password, used when `login` is called without one.
    pub password: Option<String>,
    /// Privilege-escalation password.
    pub enable_password: Option<String>,
    /// Clean pager artifacts and backspace redraws out of `output`.
    pub normalize_output: bool,
    /// Options forwarded to the underlying session.
    pub session: SessionOptions,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            protocol: Protocol::Ssh,
            host: String::new(),
            port: None,
            username: None,
            extra_args: None,
            prompt: DEFAULT_PROMPT.to_string(),
            password: None,
            enable_password: None,
            normalize_output: true,
            session: SessionOptions::default(),
        }
    }
}

impl DeviceOptions {
    /// Options for `host` with everything else defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Options preset for IOS-style devices: mode-aware prompt regex,
    /// output normalization on.
    pub fn cisco(host: impl Into<String>) -> Self {
        Self {
            prompt: CISCO_PROMPT.to_string(),
            ..Self::new(host)
        }
    }

    /// Set the transport.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set a non-default port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username for the spawn command line.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Append extra arguments to the spawn command line. See
    /// [`DeviceOptions::extra_args`] for the trust boundary.
    pub fn extra_args(mut self, args: impl Into<String>) -> Self {
        self.extra_args = Some(args.into());
        self
    }

    /// Set the idle-prompt regex.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the privilege-escalation password.
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = Some(password.into());
        self
    }

    /// Control output normalization.
    pub fn normalize_output(mut self, normalize: bool) -> Self {
        self.normalize_output = normalize;
        self
    }

    /// Replace the underlying session options.
    pub fn session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }
}

/// Per-send options; the defaults match `send`.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Wait for the prompt after writing. When false the command is written
    /// and `send_with` returns immediately with an empty string.
    pub wait: bool,
    /// Override the wait timeout for this send.
    pub timeout: Option<Duration>,
    /// Override output-buffer clearing for this send.
    pub clear_output_on_wait: Option<bool>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: None,
            clear_output_on_wait: None,
        }
    }
}

/// Options for [`NetworkDevice::send_lines`].
#[derive(Debug, Clone)]
pub struct SendLinesOptions {
    /// Lines written before waiting for a prompt. Raising this speeds up
    /// large batches at the cost of flow control per line.
    pub max_lines: usize,
    /// Perform a final prompt wait so trailing output has arrived before
    /// returning.
    pub wait_for_output: bool,
    /// Override the wait timeout for each prompt wait.
    pub timeout: Option<Duration>,
}

impl Default for SendLinesOptions {
    fn default() -> Self {
        Self {
            max_lines: 1,
            wait_for_output: true,
            timeout: None,
        }
    }
}

/// Mutable state shared between the login reactions.
struct LoginState {
    level: u32,
    pending_password: String,
    enable_password: Option<String>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An interactive CLI session with one network device.
///
/// # Examples
///
/// ```no_run
/// use remotectl::{DeviceOptions, NetworkDevice};
///
/// # async fn example() -> Result<(), remotectl::RemoteError> {
/// let options = DeviceOptions::cisco("sw1.example.net")
///     .username("admin")
///     .password("secret")
///     .enable_password("more-secret");
///
/// let mut device = NetworkDevice::new(options);
/// device.login(None, None).await?;
/// let version = device.send("show version").await?;
/// device.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct NetworkDevice {
    options: DeviceOptions,
    session: Option<Session>,
    auth_level: AuthLevel,
    last_wait_status: Option<WaitStatus>,
}

impl NetworkDevice {
    /// A device handle; nothing is spawned until `connect` (or a method
    /// that needs a session) runs.
    pub fn new(options: DeviceOptions) -> Self {
        Self {
            options,
            session: None,
            auth_level: AuthLevel::Unauthenticated,
            last_wait_status: None,
        }
    }

    /// A device handle driving an already-spawned session.
    ///
    /// `connect` becomes a no-op; useful when the transport was spawned by
    /// the caller.
    pub fn attach(options: DeviceOptions, session: Session) -> Self {
        Self {
            options,
            session: Some(session),
            auth_level: AuthLevel::Unauthenticated,
            last_wait_status: None,
        }
    }

    /// Spawn the transport subprocess. Does nothing when already connected.
    ///
    /// No interaction is performed beyond starting the process; `login`
    /// drives the handshake.
    pub fn connect(&mut self) -> Result<(), RemoteError> {
        if self.session.is_some() {
            return Ok(());
        }

        let cmd = build_command(
            self.options.protocol,
            &self.options.host,
            self.options.username.as_deref(),
            self.options.port,
            self.options.extra_args.as_deref(),
        )?;
        debug!(command = %cmd, "connecting");

        let session = SessionBuilder::new()
            .options(self.options.session.clone())
            .spawn(&cmd)?;
        self.session = Some(session);
        Ok(())
    }

    /// Terminate the session. Does nothing when not connected.
    pub async fn disconnect(&mut self) -> Result<(), RemoteError> {
        if let Some(mut session) = self.session.take() {
            session.end().await?;
        }
        self.auth_level = AuthLevel::Unauthenticated;
        Ok(())
    }

    /// Log in to the device and, when an enable password is available,
    /// escalate in the same handshake.
    ///
    /// Handles the known connection scenarios: unknown host keys are
    /// confirmed, password prompts are answered for as long as the device
    /// keeps asking (bounded only by the timeout), and the known failure
    /// texts abort immediately. When escalation is requested the first
    /// prompt match issues `enable` and switches the pending password;
    /// the second prompt match completes the login.
    ///
    /// Already being logged in is a no-op that reports the current level.
    ///
    /// # Errors
    ///
    /// `LoginFailure` when no prompt was reached; it carries the wait
    /// status and the captured output. `Configuration` when no password
    /// is known.
    pub async fn login(
        &mut self,
        password: Option<&str>,
        enable: Option<&str>,
    ) -> Result<AuthLevel, RemoteError> {
        self.connect()?;

        if self.auth_level > AuthLevel::Unauthenticated {
            return Ok(self.auth_level);
        }

        let password = password
            .map(str::to_string)
            .or_else(|| self.options.password.clone())
            .ok_or_else(|| RemoteError::Configuration("no password defined for login".into()))?;
        let enable = enable
            .map(str::to_string)
            .or_else(|| self.options.enable_password.clone());

        let state = Arc::new(Mutex::new(LoginState {
            level: 0,
            pending_password: password,
            enable_password: enable,
        }));

        let password_state = Arc::clone(&state);
        let prompt_state = Arc::clone(&state);

        let mut set = PatternSet::new()
            .expect(Pattern::exact("Connection refused"))
            .on(
                Pattern::regex(r"yes/no\)\?")?,
                Reaction::SendLine("yes".into()),
            )
            .expect(Pattern::exact("Host key verification failed"))
            .expect(Pattern::exact("Permission denied"))
            .expect(Pattern::exact("Access denied"))
            .on(
                Pattern::regex("[Pp]assword:")?,
                Reaction::Custom(Box::new(move |ctx| {
                    let state = lock(&password_state);
                    ctx.write_line(&state.pending_password);
                    WaitControl::Continue
                })),
            )
            .on(
                Pattern::regex(&self.options.prompt)?,
                Reaction::Custom(Box::new(move |ctx| {
                    let mut state = lock(&prompt_state);
                    state.level += 1;
                    if state.level == 1 {
                        if let Some(enable) = state.enable_password.take() {
                            ctx.write_line("enable");
                            state.pending_password = enable;
                            return WaitControl::Continue;
                        }
                    }
                    WaitControl::Done
                })),
            );

        let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
        let status = session.wait(&mut set).await?;
        self.last_wait_status = Some(status);

        let level = lock(&state).level;
        self.auth_level = match level {
            0 => AuthLevel::Unauthenticated,
            1 => AuthLevel::User,
            _ => AuthLevel::Privileged,
        };
        debug!(?status, level = ?self.auth_level, "login finished");

        if self.auth_level == AuthLevel::Unauthenticated {
            return Err(RemoteError::LoginFailure {
                status,
                output: self.output(),
            });
        }
        Ok(self.auth_level)
    }

    /// Escalate privileges on an already logged-in session.
    ///
    /// Issues `enable` and answers the password prompt exactly once; a
    /// second prompt means the password was rejected and the attempt is
    /// abandoned rather than retried. Returns whether a prompt was reached
    /// (and promotes the auth level when it was).
    pub async fn enable(&mut self, password: &str) -> Result<bool, RemoteError> {
        self.connect()?;

        let ok = Arc::new(Mutex::new(false));
        let attempts = Arc::new(Mutex::new(0u32));
        let password = password.to_string();
        let ok_clone = Arc::clone(&ok);

        let mut set = PatternSet::new()
            .expect(Pattern::exact("Permission denied"))
            // Already enabled; the escalation command itself errors out.
            .expect(Pattern::exact("ERROR: %"))
            .on(
                Pattern::regex("[Pp]assword:")?,
                Reaction::Custom(Box::new(move |ctx| {
                    let mut attempts = lock(&attempts);
                    *attempts += 1;
                    if *attempts > 1 {
                        return WaitControl::Done;
                    }
                    ctx.write_line(&password);
                    WaitControl::Continue
                })),
            )
            .on(
                Pattern::regex(&self.options.prompt)?,
                Reaction::Custom(Box::new(move |ctx| {
                    *lock(&ok_clone) = true;
                    ctx.done()
                })),
            );

        let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
        session.write_line("enable").await?;
        let status = session.wait(&mut set).await?;
        self.last_wait_status = Some(status);

        let ok = *lock(&ok);
        if ok {
            self.auth_level = AuthLevel::Privileged;
        }
        debug!(?status, ok, "enable finished");
        Ok(ok)
    }

    /// Send a command and wait for the prompt, answering pager prompts
    /// along the way.
    ///
    /// Returns the output captured during the wait, normalized when the
    /// device options ask for it.
    pub async fn send(&mut self, cmd: &str) -> Result<String, RemoteError> {
        self.send_with(cmd, &SendOptions::default()).await
    }

    /// `send` with per-call options.
    pub async fn send_with(
        &mut self,
        cmd: &str,
        options: &SendOptions,
    ) -> Result<String, RemoteError> {
        self.connect()?;
        self.write_line(cmd).await?;

        if !options.wait {
            return Ok(String::new());
        }

        let mut set = PatternSet::new()
            .on(
                Pattern::regex("<--- More ---> *$")?,
                Reaction::Send(" ".into()),
            )
            .on(Pattern::regex(" +--More-- *$")?, Reaction::Send(" ".into()))
            .expect(Pattern::regex(&self.options.prompt)?);

        let overrides = WaitOverrides {
            timeout: options.timeout,
            clear_output_on_wait: options.clear_output_on_wait,
            log_stdout: None,
        };

        let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
        let status = session.wait_with(&mut set, &overrides).await?;
        self.last_wait_status = Some(status);
        Ok(self.output())
    }

    /// Send a batch of lines, waiting for the prompt every `max_lines`
    /// lines, and return everything captured.
    ///
    /// The output buffer is not cleared between lines, so the returned
    /// string covers the whole batch. A timeout or stream-end during any
    /// line aborts the remaining queued lines. When the last line was sent
    /// without a wait, one final prompt-only wait runs so trailing output
    /// has arrived before returning.
    pub async fn send_lines(
        &mut self,
        lines: &[&str],
        options: &SendLinesOptions,
    ) -> Result<String, RemoteError> {
        self.connect()?;

        let max_lines = options.max_lines.max(1);
        let mut count = 0usize;
        let mut unwaited = 0usize;

        if let Some(session) = self.session.as_mut() {
            session.clear_output();
        }

        for line in lines {
            count += 1;
            if count > max_lines {
                count = 1;
            }
            unwaited += 1;

            let wait = count >= max_lines;
            if wait {
                unwaited -= 1;
            }

            let send_options = SendOptions {
                wait,
                timeout: options.timeout,
                clear_output_on_wait: Some(false),
            };
            self.send_with(line, &send_options).await?;

            if matches!(
                self.last_wait_status,
                Some(WaitStatus::Timeout) | Some(WaitStatus::Eof)
            ) {
                debug!(status = ?self.last_wait_status, "aborting remaining lines");
                break;
            }
        }

        if options.wait_for_output && unwaited > 0 {
            let mut set = PatternSet::new().expect(Pattern::regex(&self.options.prompt)?);
            let overrides = WaitOverrides {
                timeout: options.timeout,
                clear_output_on_wait: Some(false),
                log_stdout: None,
            };
            let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
            let status = session.wait_with(&mut set, &overrides).await?;
            self.last_wait_status = Some(status);
        }

        Ok(self.output())
    }

    /// `send_lines` for a newline-joined block of text, as read from a
    /// configuration file.
    pub async fn send_text(
        &mut self,
        text: &str,
        options: &SendLinesOptions,
    ) -> Result<String, RemoteError> {
        let lines: Vec<&str> = text.lines().collect();
        self.send_lines(&lines, options).await
    }

    /// Write raw text to the device.
    pub async fn write(&mut self, data: &str) -> Result<(), RemoteError> {
        let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
        session.write(data.as_bytes()).await
    }

    /// Write a line to the device.
    ///
    /// Ctrl-Z is sent bare: appending an EOL after it would execute an
    /// extra empty command on the device.
    pub async fn write_line(&mut self, line: &str) -> Result<(), RemoteError> {
        let session = self.session.as_mut().ok_or(RemoteError::NotConnected)?;
        if line == CTRL_Z {
            session.write(line.as_bytes()).await
        } else {
            session.write_line(line).await
        }
    }

    /// Accumulated output, normalized when the options ask for it.
    pub fn output(&self) -> String {
        let raw = self
            .session
            .as_ref()
            .map(|s| s.output().to_string())
            .unwrap_or_default();
        if self.options.normalize_output {
            normalize(&raw)
        } else {
            raw
        }
    }

    /// Toggle live stdout mirroring; returns the previous setting.
    pub fn verbose(&mut self, value: bool) -> bool {
        let previous = std::mem::replace(&mut self.options.session.log_stdout, value);
        match self.session.as_mut() {
            Some(session) => session.set_log_stdout(value),
            None => previous,
        }
    }

    /// Privilege level reached by the last login/enable.
    pub fn auth_level(&self) -> AuthLevel {
        self.auth_level
    }

    /// Result code of the most recent wait issued by this device.
    pub fn last_wait_status(&self) -> Option<WaitStatus> {
        self.last_wait_status
    }

    /// The underlying session, when connected.
    pub fn session(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// The device options.
    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }
}
