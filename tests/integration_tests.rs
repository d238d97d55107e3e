//! Integration tests for remotectl

use anyhow::Result;
use remotectl::{
    AuthLevel, DeviceOptions, NetworkDevice, Pattern, PatternSet, Reaction, RemoteError, Rule,
    SendLinesOptions, Session, WaitControl, WaitStatus,
};
use std::time::Duration;

fn session(command: &str) -> Session {
    Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(command)
        .expect("Failed to spawn command")
}

#[tokio::test]
async fn wait_finishes_on_expected_text() {
    let mut session = session("echo Hello World");

    let mut set = PatternSet::new().expect(Pattern::exact("World"));
    let status = session.wait(&mut set).await.expect("wait failed");

    assert_eq!(status, WaitStatus::Done);
    assert!(session.before().contains("Hello"));
    assert!(!session.before().contains("World"));
}

#[tokio::test]
async fn first_registered_rule_wins() {
    let mut session = session("echo alpha beta");

    let mut set = PatternSet::new()
        .on(
            Pattern::exact("alpha"),
            Reaction::Custom(Box::new(|_| WaitControl::Code(1))),
        )
        .on(
            Pattern::exact("beta"),
            Reaction::Custom(Box::new(|_| WaitControl::Code(2))),
        );

    let status = session.wait(&mut set).await.expect("wait failed");
    assert_eq!(status, WaitStatus::Code(1));
}

#[tokio::test]
#[cfg(unix)]
async fn reaction_input_reaches_the_subprocess() {
    let mut session = session("printf 'name? '; read -r name; echo \"got:$name\"");

    let mut set = PatternSet::new()
        .on(Pattern::exact("name? "), Reaction::SendLine("world".into()))
        .expect(Pattern::exact("got:world"));

    let status = session.wait(&mut set).await.expect("wait failed");
    assert_eq!(status, WaitStatus::Done);
}

#[tokio::test]
#[cfg(unix)]
async fn timeout_is_a_result_code_not_an_error() {
    let mut session = Session::builder()
        .timeout(Duration::from_millis(200))
        .spawn("sleep 2")
        .expect("Failed to spawn");

    let mut set = PatternSet::new().expect(Pattern::exact("never printed"));
    let status = session.wait(&mut set).await.expect("wait failed");

    assert_eq!(status, WaitStatus::Timeout);
}

#[tokio::test]
async fn stream_end_is_a_result_code_not_an_error() {
    let mut session = session("echo farewell");

    let mut set = PatternSet::new().expect(Pattern::exact("no such text"));
    let status = session.wait(&mut set).await.expect("wait failed");

    assert_eq!(status, WaitStatus::Eof);
    assert!(session.before().contains("farewell"));
}

#[tokio::test]
#[cfg(unix)]
async fn timeout_reaction_supplies_its_own_code() {
    let mut session = Session::builder()
        .timeout(Duration::from_millis(200))
        .spawn("sleep 2")
        .expect("Failed to spawn");

    let mut set = PatternSet::new()
        .expect(Pattern::exact("never printed"))
        .on(
            Pattern::Timeout,
            Reaction::Custom(Box::new(|_| WaitControl::Code(-7))),
        );

    let status = session.wait(&mut set).await.expect("wait failed");
    assert_eq!(status, WaitStatus::Code(-7));
}

#[tokio::test]
async fn reactionless_match_is_fatal() {
    let mut session = session("echo SURPRISE");

    let mut set = PatternSet::new().rule(Rule::new(Pattern::exact("SURPRISE")));
    let err = session.wait(&mut set).await.expect_err("should fail");

    match err {
        RemoteError::UnhandledMatch { index, pattern } => {
            assert_eq!(index, 0);
            assert_eq!(pattern, "SURPRISE");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn regex_captures_are_reported() {
    let mut session = session("echo uptime is 4 weeks");

    let mut set =
        PatternSet::new().expect(Pattern::regex(r"uptime is (\d+) (\w+)").expect("Invalid regex"));
    let status = session.wait(&mut set).await.expect("wait failed");

    assert_eq!(status, WaitStatus::Done);
    assert_eq!(session.last_captures()[1], "4");
    assert_eq!(session.last_captures()[2], "weeks");
}

#[tokio::test]
async fn capture_is_incremental_and_idempotent() {
    let mut session = session("echo onetwothree");

    let mut set = PatternSet::new().expect(Pattern::exact("two"));
    session.wait(&mut set).await.expect("wait failed");
    assert!(session.before().contains("one"));

    // Give the subprocess time to finish printing.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let rest = session.capture_since_last_read();
    assert!(rest.contains("three"));
    assert_eq!(session.capture_since_last_read(), "");
}

#[tokio::test]
#[cfg(unix)]
async fn exit_status_is_reported() {
    let mut session = session("echo bye");
    let mut set = PatternSet::new().expect(Pattern::exact("bye"));
    session.wait(&mut set).await.expect("wait failed");

    let status = session.wait_exit().await.expect("wait_exit failed");
    assert!(status.success());
}

// ---------------------------------------------------------------------------
// Device-level tests against scripted fake devices.
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn fake_device(options: DeviceOptions, script: &str) -> NetworkDevice {
    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .spawn(script)
        .expect("Failed to spawn fake device");
    NetworkDevice::attach(options, session)
}

#[tokio::test]
#[cfg(unix)]
async fn login_reaches_user_level() -> Result<()> {
    let script = "printf 'Password: '; read -r pw; printf 'switch> '; sleep 1";
    let mut device = fake_device(DeviceOptions::cisco("unused"), script);

    let level = device.login(Some("secret"), None).await?;

    assert_eq!(level, AuthLevel::User);
    assert_eq!(device.auth_level(), AuthLevel::User);
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn login_with_enable_reaches_privileged_level() -> Result<()> {
    let script = "stty -echo 2>/dev/null; \
                  printf 'Password: '; read -r pw; \
                  printf 'switch> '; read -r cmd; \
                  printf 'Password: '; read -r epw; \
                  printf 'switch# '; sleep 1";
    let mut device = fake_device(DeviceOptions::cisco("unused"), script);

    let level = device.login(Some("secret"), Some("more-secret")).await?;

    assert_eq!(level, AuthLevel::Privileged);
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn login_failure_text_is_an_error() {
    let script = "printf 'Password: '; read -r pw; echo 'Permission denied'; sleep 1";
    let mut device = fake_device(DeviceOptions::cisco("unused"), script);

    let err = device
        .login(Some("wrong"), None)
        .await
        .expect_err("login should fail");

    match err {
        RemoteError::LoginFailure { status, .. } => assert_eq!(status, WaitStatus::Done),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(device.auth_level(), AuthLevel::Unauthenticated);
}

#[tokio::test]
#[cfg(unix)]
async fn login_is_idempotent_once_authenticated() -> Result<()> {
    let script = "printf 'Password: '; read -r pw; printf 'switch> '; sleep 1";
    let mut device = fake_device(DeviceOptions::cisco("unused"), script);

    device.login(Some("secret"), None).await?;
    // Second call must not touch the subprocess.
    let level = device.login(None, None).await?;
    assert_eq!(level, AuthLevel::User);
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn enable_promotes_the_auth_level() -> Result<()> {
    let script = "stty -echo 2>/dev/null; \
                  read -r cmd; printf 'Password: '; read -r pw; printf 'host1# '; sleep 1";
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), script);

    let ok = device.enable("secret").await?;
    assert!(ok);
    assert_eq!(device.auth_level(), AuthLevel::Privileged);
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn enable_gives_up_on_a_second_password_prompt() -> Result<()> {
    // A re-prompt means the password was rejected; it is answered once and
    // never re-sent.
    let script = "stty -echo 2>/dev/null; \
                  read -r cmd; printf 'Password: '; read -r pw; \
                  printf 'Password: '; read -r pw2; sleep 1";
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), script);

    let ok = device.enable("rejected").await?;
    assert!(!ok);
    assert_eq!(device.auth_level(), AuthLevel::Unauthenticated);
    assert_eq!(device.last_wait_status(), Some(WaitStatus::Done));
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn send_answers_pager_prompts() -> Result<()> {
    // After each answered keypress the router erases the prompt line
    // (9 backspaces, 8 spaces, 9 backspaces) before printing the next page.
    let erase = "\\b\\b\\b\\b\\b\\b\\b\\b\\b        \\b\\b\\b\\b\\b\\b\\b\\b\\b";
    let script = format!(
        "stty -icanon -echo min 1 time 0 2>/dev/null; \
         read -r cmd; \
         printf 'line one\\n --More-- '; \
         head -c 1 >/dev/null; \
         printf '{erase}line two\\n --More-- '; \
         head -c 1 >/dev/null; \
         printf '{erase}line three\\nhost1# '; sleep 1"
    );
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), &script);

    let output = device.send("show run").await?;

    assert!(output.contains("\nline two"));
    assert!(output.contains("\nline three"));
    assert!(!output.contains("More"));
    assert!(!output.contains('\u{8}'));
    assert_eq!(device.last_wait_status(), Some(WaitStatus::Done));
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn send_lines_covers_the_whole_batch() -> Result<()> {
    let script = "stty -echo 2>/dev/null; \
                  while read -r line; do echo \"ok:$line\"; printf 'host1# '; done";
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), script);

    let output = device
        .send_lines(&["one", "two", "three"], &SendLinesOptions::default())
        .await?;

    assert!(output.contains("ok:one"));
    assert!(output.contains("ok:two"));
    assert!(output.contains("ok:three"));
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn send_lines_batches_waits() -> Result<()> {
    let script = "stty -echo 2>/dev/null; \
                  while read -r line; do echo \"ok:$line\"; printf 'host1# '; done";
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), script);

    let options = SendLinesOptions {
        max_lines: 3,
        ..SendLinesOptions::default()
    };
    // With batching, prompt waits can fire before every line's output has
    // arrived; only the earliest line is guaranteed to be in the buffer.
    let output = device.send_lines(&["a", "b", "c", "d"], &options).await?;

    assert!(output.contains("ok:a"));
    assert_eq!(device.last_wait_status(), Some(WaitStatus::Done));
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn send_text_splits_on_newlines() -> Result<()> {
    let script = "stty -echo 2>/dev/null; \
                  while read -r line; do echo \"ok:$line\"; printf 'host1# '; done";
    let mut device = fake_device(DeviceOptions::new("unused").prompt("host1# *$"), script);

    let output = device
        .send_text("one\ntwo\n", &SendLinesOptions::default())
        .await?;

    assert!(output.contains("ok:one"));
    assert!(output.contains("ok:two"));
    Ok(())
}

#[tokio::test]
#[cfg(unix)]
async fn disconnect_resets_authentication() -> Result<()> {
    let script = "printf 'Password: '; read -r pw; printf 'switch> '; sleep 1";
    let mut device = fake_device(DeviceOptions::cisco("unused"), script);

    device.login(Some("secret"), None).await?;
    device.disconnect().await?;

    assert_eq!(device.auth_level(), AuthLevel::Unauthenticated);
    Ok(())
}
