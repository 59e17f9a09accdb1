//! Drives `AzCliRunner` against a stand-in `az` script.
#![cfg(unix)]

use az_cli_runner::{AzCliRunner, AzCommand, CommandRunner, OutputFormat, OutputLine};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn fake_az(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("az");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runner(path: &Path) -> AzCliRunner {
    AzCliRunner::with_executable(path.to_string_lossy())
}

#[tokio::test]
async fn arguments_reach_az_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let az = fake_az(dir.path(), r#"for a in "$@"; do printf '%s\n' "$a"; done"#);

    let value = "p@ss word; $(touch pwned) 'q' \"dq\"";
    let cmd = AzCommand::new(["keyvault", "secret", "set"])
        .arg("--vault-name", "kv-prod")
        .arg("--name", "db-password")
        .sensitive_arg("--value", value);
    let result = runner(&az).run(&cmd, None).await;

    assert!(result.success);
    let args: Vec<&str> = result.output.lines().collect();
    assert_eq!(
        args,
        vec![
            "keyvault",
            "secret",
            "set",
            "--vault-name",
            "kv-prod",
            "--name",
            "db-password",
            "--value",
            value,
            "-o",
            "json",
        ]
    );
    assert!(!dir.path().join("pwned").exists());
    assert!(!cmd.redacted_line().contains("p@ss"));
}

#[tokio::test]
async fn az_sees_non_interactive_environment() {
    let dir = tempfile::tempdir().unwrap();
    let az = fake_az(
        dir.path(),
        r#"printf '%s %s\n' "$AZURE_CORE_NO_COLOR" "$AZURE_CORE_ONLY_SHOW_ERRORS""#,
    );

    let result = runner(&az)
        .run(&AzCommand::new(["account", "show"]), None)
        .await;
    assert!(result.success);
    assert_eq!(result.output, "true true");
}

#[tokio::test]
async fn spawned_login_keeps_cli_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let az = fake_az(
        dir.path(),
        r#"printf '%s|%s\n' "$AZURE_CORE_NO_COLOR" "${AZURE_CORE_ONLY_SHOW_ERRORS:-unset}""#,
    );

    let cmd = AzCommand::new(["login"])
        .flag("--use-device-code")
        .output(OutputFormat::None);
    let mut spawned = runner(&az).spawn(&cmd).await.unwrap();
    let line = tokio::time::timeout(Duration::from_secs(5), spawned.next_line())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, OutputLine::Stdout("true|unset".into()));
    assert_eq!(spawned.wait().await, Some(0));
}

#[tokio::test]
async fn default_timeout_applies_when_none_given() {
    let dir = tempfile::tempdir().unwrap();
    let az = fake_az(dir.path(), "sleep 5");

    let result = runner(&az)
        .with_default_timeout(Duration::from_millis(100))
        .run(&AzCommand::new(["keyvault", "list"]), None)
        .await;
    assert!(!result.success);
    assert!(result.timed_out);
}

#[tokio::test]
async fn device_login_output_streams_before_exit() {
    let dir = tempfile::tempdir().unwrap();
    let az = fake_az(
        dir.path(),
        "echo 'To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code ABCD1234 to authenticate.' >&2\nsleep 30",
    );

    let cmd = AzCommand::new(["login"])
        .flag("--use-device-code")
        .output(OutputFormat::None);
    let mut spawned = runner(&az).spawn(&cmd).await.unwrap();

    let line = tokio::time::timeout(Duration::from_secs(5), spawned.next_line())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(&line, OutputLine::Stderr(_)));
    assert!(line.text().contains("ABCD1234"));

    spawned.cancel();
    let code = tokio::time::timeout(Duration::from_secs(5), spawned.wait())
        .await
        .unwrap();
    assert_eq!(code, None);
}
