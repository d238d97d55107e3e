//! remotectl: Interactive remote-session automation for Rust
//!
//! remotectl automates interactive command-line sessions with remote hosts
//! (routers, switches, Unix servers) reached through a spawned subprocess
//! such as `ssh` or `telnet`. It drives the session by waiting for expected
//! text patterns in the subprocess output and running the reaction attached
//! to whichever pattern fires first, repeating until a reaction declares
//! the wait done, the timeout elapses, or the stream ends.
//!
//! # Features
//!
//! - **Pattern waits**: exact strings, regexes with capture groups, and
//!   shell-style globs, in strict registration-order priority
//! - **Reactions**: send text, finish the wait, or run a stateful handler,
//!   with timeout and end-of-stream reported as result codes rather than
//!   errors
//! - **Device automation**: login/enable handshakes, pager-aware command
//!   sends, and batched configuration pushes
//! - **Output reconstruction**: pager prompts and backspace-redrawn echo
//!   are cleaned out of captured output
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use remotectl::{DeviceOptions, NetworkDevice};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = DeviceOptions::cisco("sw1.example.net")
//!         .username("admin")
//!         .password("secret");
//!
//!     let mut device = NetworkDevice::new(options);
//!     device.login(None, None).await?;
//!
//!     let version = device.send("show version").await?;
//!     println!("{version}");
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # The wait primitive
//!
//! Higher-level behaviors are all pattern sets fed to [`Session::wait`]:
//!
//! ```rust,no_run
//! use remotectl::{Pattern, PatternSet, Reaction, Session, WaitStatus};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::spawn("ssh -l admin gw.example.net")?;
//!
//! let mut set = PatternSet::new()
//!     .on(Pattern::regex(r"yes/no\)\?")?, Reaction::SendLine("yes".into()))
//!     .on(Pattern::regex("[Pp]assword:")?, Reaction::SendLine("secret".into()))
//!     .expect(Pattern::regex(r"[#$] *$")?);
//!
//! match session.wait(&mut set).await? {
//!     WaitStatus::Done => println!("logged in: {}", session.before()),
//!     WaitStatus::Timeout => println!("link went quiet"),
//!     WaitStatus::Eof => println!("connection dropped"),
//!     other => println!("reaction code: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod buffer;
mod device;
mod pattern;
mod result;
mod session;

// Public API exports
pub use device::{
    build_command, normalize, shell_quote, AuthLevel, DeviceOptions, NetworkDevice, Protocol,
    SendLinesOptions, SendOptions, CTRL_Z,
};
pub use pattern::{Pattern, PatternSet, Reaction, Rule, WaitContext, WaitControl};
pub use result::{PatternError, RemoteError, WaitStatus};
pub use session::{Session, SessionBuilder, SessionOptions, WaitOverrides};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
