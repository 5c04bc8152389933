//! Tests for Claude process spawning and control.

use std::time::Duration;

use tempfile::TempDir;
use tokio::io::AsyncReadExt;

use claude_session::cli::{build_args, ClaudeProcess, SpawnError};
use claude_session::config::SessionConfig;

use crate::support::fake_claude;

fn spawn(config: &SessionConfig, prompt: &str) -> Result<ClaudeProcess, SpawnError> {
    let invocation = build_args(config, prompt, None).unwrap();
    ClaudeProcess::spawn(config, invocation)
}

async fn read_stdout(process: &mut ClaudeProcess) -> String {
    let mut stdout = process.take_stdout().expect("stdout available");
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    output
}

#[tokio::test]
async fn spawn_passes_arguments_and_reports_exit_code() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), r#"for arg in "$@"; do echo "$arg"; done"#);
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "hello there").unwrap();
    let output = read_stdout(&mut process).await;

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.first(), Some(&"--print"));
    assert_eq!(lines.last(), Some(&"hello there"));
    assert_eq!(process.wait().await.unwrap(), 0);
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn take_stdout_only_once() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exit 0");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    assert!(process.take_stdout().is_some());
    assert!(process.take_stdout().is_none());
    process.wait().await.unwrap();
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exit 3");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    assert_eq!(process.wait().await.unwrap(), 3);
}

#[tokio::test]
async fn kill_reports_signal() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exec sleep 10");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    assert!(process.id().is_some());
    process.kill();

    let result = tokio::time::timeout(Duration::from_secs(5), process.wait())
        .await
        .expect("killed process should exit promptly");
    assert!(matches!(result, Err(SpawnError::Signaled { signal: Some(9) })));
}

#[tokio::test]
async fn kill_after_exit_is_harmless() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exit 0");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    assert_eq!(process.wait().await.unwrap(), 0);
    process.kill();
    process.kill();
    assert!(process.id().is_none());
    assert!(process.try_wait().unwrap().is_some());
}

#[tokio::test]
async fn graceful_terminate_stops_process() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exec sleep 10");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    process
        .graceful_terminate(Duration::from_secs(2))
        .await
        .unwrap();
    assert!(process.try_wait().unwrap().is_some());
}

#[tokio::test]
async fn graceful_terminate_escalates_to_kill() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "trap '' TERM\nwhile true; do sleep 1; done");
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;
    process
        .graceful_terminate(Duration::from_millis(200))
        .await
        .unwrap();
    assert!(process.try_wait().unwrap().is_some());
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig::new().executable(dir.path().join("no-such-claude"));

    let result = spawn(&config, "task");
    assert!(matches!(result, Err(SpawnError::NotFound)));
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = TempDir::new().unwrap();
    let workdir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "pwd");
    let config = SessionConfig::new()
        .executable(binary)
        .working_dir(workdir.path());

    let mut process = spawn(&config, "task").unwrap();
    let output = read_stdout(&mut process).await;

    let expected = std::fs::canonicalize(workdir.path()).unwrap();
    let actual = std::fs::canonicalize(output.trim()).unwrap();
    assert_eq!(actual, expected);
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn heavy_stderr_does_not_block() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(
        dir.path(),
        "i=0\nwhile [ $i -lt 5000 ]; do echo \"diagnostic line $i padding padding padding\" >&2; i=$((i+1)); done\necho done",
    );
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    let output = tokio::time::timeout(Duration::from_secs(10), read_stdout(&mut process))
        .await
        .expect("stdout should complete while stderr is drained");
    assert_eq!(output.trim(), "done");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_utf8_stderr_keeps_draining() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(
        dir.path(),
        "printf '\\377\\376 junk\\n' >&2\nsleep 0.3\necho diag >&2\necho still-alive",
    );
    let config = SessionConfig::new().executable(binary);

    let mut process = spawn(&config, "task").unwrap();
    let output = read_stdout(&mut process).await;

    assert_eq!(output.trim(), "still-alive");
    assert_eq!(process.wait().await.unwrap(), 0);
}

#[tokio::test]
async fn mcp_config_lives_as_long_as_process() {
    use claude_session::config::McpServerConfig;

    let dir = TempDir::new().unwrap();
    // Print the contents of the file named after --mcp-config.
    let binary = fake_claude(
        dir.path(),
        r#"prev=""
for arg in "$@"; do
  if [ "$prev" = "--mcp-config" ]; then cat "$arg"; fi
  prev="$arg"
done"#,
    );
    let config = SessionConfig::new()
        .executable(binary)
        .mcp_server("files", McpServerConfig::new("mcp-files"));

    let invocation = build_args(&config, "task", None).unwrap();
    let path = invocation.mcp_config_path().unwrap().to_path_buf();
    let mut process = ClaudeProcess::spawn(&config, invocation).unwrap();

    let output = read_stdout(&mut process).await;
    assert!(output.contains("\"mcpServers\""));
    assert_eq!(process.wait().await.unwrap(), 0);
    assert!(path.exists());

    drop(process);
    assert!(!path.exists());
}
