//! Tests for multi-turn sessions against a fake Claude executable.

use futures_util::StreamExt;
use tempfile::TempDir;

use claude_session::cli::{ClaudeEvent, ContentBlock, SpawnError};
use claude_session::config::SessionConfig;
use claude_session::session::{Session, SessionError, SessionState, StreamOptions};

use crate::support::{fake_claude, ECHO_TURN};

fn echo_session(dir: &TempDir) -> Session {
    let binary = fake_claude(dir.path(), ECHO_TURN);
    Session::new(SessionConfig::new().executable(binary))
}

async fn drain(session: &mut Session, options: StreamOptions) -> Vec<ClaudeEvent> {
    session.stream(options).unwrap().collect().await
}

fn assistant_text(event: &ClaudeEvent) -> Option<String> {
    match event {
        ClaudeEvent::Assistant(assistant) => assistant.text(),
        _ => None,
    }
}

#[tokio::test]
async fn fresh_session_captures_identity() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.session_id().is_none());

    session.send("What is 2+2?").unwrap();
    assert_eq!(session.state(), SessionState::Active);

    let events = drain(&mut session, StreamOptions::default()).await;
    assert_eq!(events.len(), 3, "malformed line should be skipped");
    assert_eq!(
        events[0].as_init().map(|init| init.session_id.as_str()),
        Some("fresh-session")
    );
    assert_eq!(
        assistant_text(&events[1]).as_deref(),
        Some("echo: What is 2+2?")
    );
    let ClaudeEvent::Assistant(assistant) = &events[1] else {
        panic!("Expected Assistant event");
    };
    assert!(matches!(
        &assistant.message.content[0],
        ContentBlock::Thinking { thinking, .. } if thinking == "pondering"
    ));
    assert!(events[2].is_terminal());

    assert_eq!(session.session_id(), Some("fresh-session"));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_exit_code().await.unwrap(), Some(0));
    let stats = session.stats();
    assert_eq!(stats.invocations, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn resumed_session_keeps_identity() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), ECHO_TURN);
    let mut session = Session::resume("abc-123", SessionConfig::new().executable(binary));
    assert_eq!(session.session_id(), Some("abc-123"));

    session.send("hello again").unwrap();
    let events = drain(&mut session, StreamOptions::default()).await;

    assert_eq!(events[0].session_id(), Some("abc-123"));
    assert_eq!(session.session_id(), Some("abc-123"));
}

#[tokio::test]
async fn second_send_resumes_captured_identity() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("args.log");
    let body = format!(
        "echo \"$@\" >> '{}'\n{ECHO_TURN}",
        log.display()
    );
    let binary = fake_claude(dir.path(), &body);
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("first").unwrap();
    drain(&mut session, StreamOptions::default()).await;
    session.send("second").unwrap();
    let events = drain(&mut session, StreamOptions::default()).await;

    let invocations: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(invocations.len(), 2);
    assert!(!invocations[0].contains("--resume"));
    assert!(invocations[1].contains("--resume fresh-session"));
    assert!(invocations[1].ends_with("second"));
    assert_eq!(assistant_text(&events[1]).as_deref(), Some("echo: second"));
    assert_eq!(session.stats().invocations, 2);
}

#[tokio::test]
async fn send_while_active_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);

    session.send("first").unwrap();
    assert!(matches!(
        session.send("second"),
        Err(SessionError::AlreadyActive)
    ));
    assert_eq!(session.stats().invocations, 1);

    drain(&mut session, StreamOptions::default()).await;
    session.send("second").unwrap();
}

#[tokio::test]
async fn stream_without_send_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);

    assert!(matches!(
        session.stream(StreamOptions::default()),
        Err(SessionError::NotActive)
    ));
    assert_eq!(session.last_exit_code().await.unwrap(), None);
}

#[tokio::test]
async fn closed_session_rejects_everything() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);

    session.send("first").unwrap();
    session.close();
    session.close();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.send("again"), Err(SessionError::Closed)));
    assert!(matches!(
        session.stream(StreamOptions::default()),
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn close_kills_in_flight_invocation() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exec sleep 30");
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("slow").unwrap();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn shutdown_terminates_in_flight_invocation() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exec sleep 30");
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("slow").unwrap();
    session
        .shutdown(std::time::Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn filtered_stream_hides_init_and_thinking() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);

    session.send("quiet").unwrap();
    let events = drain(&mut session, StreamOptions::filtered()).await;

    assert_eq!(events.len(), 2);
    let ClaudeEvent::Assistant(assistant) = &events[0] else {
        panic!("Expected Assistant event");
    };
    assert!(assistant
        .message
        .content
        .iter()
        .all(|block| matches!(block, ContentBlock::Text { .. })));
    assert!(events[1].is_terminal());
    // Identity is captured even though init was not surfaced.
    assert_eq!(session.session_id(), Some("fresh-session"));
}

#[tokio::test]
async fn missing_executable_fails_send() {
    let dir = TempDir::new().unwrap();
    let config = SessionConfig::new().executable(dir.path().join("absent"));
    let mut session = Session::new(config);

    let result = session.send("hello");
    assert!(matches!(
        result,
        Err(SessionError::Spawn(SpawnError::NotFound))
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn dropped_stream_can_be_resumed() {
    let dir = TempDir::new().unwrap();
    let mut session = echo_session(&dir);

    session.send("partial").unwrap();
    {
        let mut stream = session.stream(StreamOptions::default()).unwrap();
        let first = stream.next().await.unwrap();
        assert!(first.as_init().is_some());
    }
    assert_eq!(session.state(), SessionState::Active);

    let rest = drain(&mut session, StreamOptions::default()).await;
    assert_eq!(rest.len(), 2);
    assert_eq!(
        assistant_text(&rest[0]).as_deref(),
        Some("echo: partial")
    );
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn nonzero_exit_code_is_reported() {
    let dir = TempDir::new().unwrap();
    let body = format!("{ECHO_TURN}\nexit 3");
    let binary = fake_claude(dir.path(), &body);
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("fail").unwrap();
    let events = drain(&mut session, StreamOptions::default()).await;
    assert_eq!(events.len(), 3);
    assert_eq!(session.last_exit_code().await.unwrap(), Some(3));
}

#[tokio::test]
async fn binary_stderr_does_not_kill_turn() {
    let dir = TempDir::new().unwrap();
    let body = format!("printf '\\377\\376 junk\\n' >&2\nsleep 0.3\necho diag >&2\n{ECHO_TURN}");
    let binary = fake_claude(dir.path(), &body);
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("noisy").unwrap();
    let events = drain(&mut session, StreamOptions::default()).await;

    assert_eq!(events.len(), 3);
    assert!(events[2].is_terminal());
    assert_eq!(session.last_exit_code().await.unwrap(), Some(0));
}

#[tokio::test]
async fn empty_output_completes_turn() {
    let dir = TempDir::new().unwrap();
    let binary = fake_claude(dir.path(), "exit 0");
    let mut session = Session::new(SessionConfig::new().executable(binary));

    session.send("nothing").unwrap();
    let events = drain(&mut session, StreamOptions::default()).await;
    assert!(events.is_empty());
    assert!(session.session_id().is_none());
    assert_eq!(session.state(), SessionState::Idle);
}
