//! Spawn-command construction
//!
//! Turns connection options into the shell command string a session spawns.
//! User-supplied components are single-quoted so the produced string is safe
//! to run as one shell command.

use crate::result::RemoteError;

/// Transport used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// `ssh [-p port] [-l user] [extra] host`
    #[default]
    Ssh,
    /// `telnet [extra] [-l user] host [port]`
    Telnet,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Protocol::Ssh => "ssh",
            Protocol::Telnet => "telnet",
        }
    }

    /// Port the transport assumes when none is given on the command line.
    fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh => 22,
            Protocol::Telnet => 23,
        }
    }
}

/// Build the spawn command for `protocol` against `host`.
///
/// The port is emitted only when it differs from the protocol's default.
/// Host and username are shell-quoted; `extra` is appended verbatim and is
/// trusted to be caller-controlled flags such as
/// `-o StrictHostKeyChecking=no`, never end-user input. Line breaks are
/// rejected since they would smuggle a second shell command.
///
/// # Errors
///
/// Fails with `Configuration` when the host is empty or `extra` spans
/// multiple lines.
pub fn build_command(
    protocol: Protocol,
    host: &str,
    username: Option<&str>,
    port: Option<u16>,
    extra: Option<&str>,
) -> Result<String, RemoteError> {
    if host.trim().is_empty() {
        return Err(RemoteError::Configuration("no host defined".into()));
    }
    if extra.is_some_and(|e| e.contains(['\n', '\r'])) {
        return Err(RemoteError::Configuration(
            "extra args must be a single line".into(),
        ));
    }

    let mut cmd = String::from(protocol.as_str());
    let port = port.filter(|&p| p != protocol.default_port());
    let username = username.filter(|u| !u.is_empty());

    match protocol {
        Protocol::Ssh => {
            if let Some(p) = port {
                cmd.push_str(&format!(" -p {p}"));
            }
            if let Some(u) = username {
                cmd.push_str(&format!(" -l {}", shell_quote(u)));
            }
            if let Some(extra) = extra.filter(|e| !e.is_empty()) {
                cmd.push(' ');
                cmd.push_str(extra);
            }
            cmd.push(' ');
            cmd.push_str(&shell_quote(host));
        }
        Protocol::Telnet => {
            if let Some(extra) = extra.filter(|e| !e.is_empty()) {
                cmd.push(' ');
                cmd.push_str(extra);
            }
            if let Some(u) = username {
                cmd.push_str(&format!(" -l {}", shell_quote(u)));
            }
            cmd.push(' ');
            cmd.push_str(&shell_quote(host));
            if let Some(p) = port {
                cmd.push_str(&format!(" {p}"));
            }
        }
    }

    Ok(cmd)
}

/// Quote a string for use as a single shell word.
///
/// Plain host/user tokens pass through untouched; anything else is wrapped
/// in single quotes with embedded quotes escaped.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'@' | b':'));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_with_defaults_is_minimal() {
        let cmd = build_command(Protocol::Ssh, "gw.example.net", None, Some(22), None).unwrap();
        assert_eq!(cmd, "ssh gw.example.net");
    }

    #[test]
    fn ssh_full_form() {
        let cmd = build_command(
            Protocol::Ssh,
            "10.0.0.1",
            Some("admin"),
            Some(2222),
            Some("-o StrictHostKeyChecking=no"),
        )
        .unwrap();
        assert_eq!(cmd, "ssh -p 2222 -l admin -o StrictHostKeyChecking=no 10.0.0.1");
    }

    #[test]
    fn telnet_puts_port_last() {
        let cmd =
            build_command(Protocol::Telnet, "10.0.0.1", Some("admin"), Some(3023), None).unwrap();
        assert_eq!(cmd, "telnet -l admin 10.0.0.1 3023");
    }

    #[test]
    fn telnet_default_port_is_omitted() {
        let cmd = build_command(Protocol::Telnet, "10.0.0.1", None, Some(23), None).unwrap();
        assert_eq!(cmd, "telnet 10.0.0.1");
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(build_command(Protocol::Ssh, "  ", None, None, None).is_err());
    }

    #[test]
    fn multiline_extra_args_are_rejected() {
        let extra = Some("-v\nrm -rf /");
        assert!(build_command(Protocol::Ssh, "gw", None, None, extra).is_err());
    }

    #[test]
    fn hostile_username_is_quoted() {
        let cmd = build_command(Protocol::Ssh, "gw", Some("a b; rm -rf /"), None, None).unwrap();
        assert_eq!(cmd, r"ssh -l 'a b; rm -rf /' gw");
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("plain-host.example.net"), "plain-host.example.net");
    }
}
