//! End-to-end tests against a scripted child process
//!
//! `sh` stands in for the CLI, so these only run on Unix.

#![cfg(unix)]

mod common;

use claudewire::{Message, ProcessConfig, Session, SessionConfig, SessionState, simple_query};
use claudewire_protocol::SystemMessage;
use common::within;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

fn scripted(script: &str) -> SessionConfig {
    SessionConfig::new(ProcessConfig::new("sh").with_args(["-c", script]))
}

const ANSWER_TWO_PLUS_TWO: &str = r#"
read prompt
printf '%s\n' '{"type":"system","subtype":"init","uuid":"s1","session_id":"cli","tools":[]}'
printf '%s\n' '{"type":"assistant","uuid":"a1","session_id":"cli","message":{"id":"msg_1","role":"assistant","model":"claude-sonnet-4-5","content":[{"type":"text","text":"4"}]}}'
printf '%s\n' '{"type":"result","subtype":"success","uuid":"r1","session_id":"cli","is_error":false,"result":"4"}'
cat >/dev/null
"#;

#[tokio::test]
async fn test_simple_query_against_child() {
    let messages: Vec<Message> =
        within(simple_query("What is 2+2?", scripted(ANSWER_TWO_PLUS_TWO)).collect()).await;

    let kinds: Vec<&str> = messages.iter().map(Message::type_name).collect();
    assert_eq!(kinds, ["system", "assistant", "result"]);
    let Message::Result(result) = &messages[2] else {
        unreachable!()
    };
    assert_eq!(result.result.as_deref(), Some("4"));
}

#[tokio::test]
async fn test_simple_query_spawn_failure() {
    let config = SessionConfig::new(ProcessConfig::new("/nonexistent/claude"));

    let messages: Vec<Message> = within(simple_query("hi", config).collect()).await;

    let [Message::Result(failure)] = messages.as_slice() else {
        panic!("expected a single error result");
    };
    assert!(failure.is_error);
    let error = &failure.errors.as_ref().unwrap()[0];
    assert!(error.starts_with("process/spawn_failed: "), "{error}");
}

#[tokio::test]
async fn test_initialize_and_close_child() {
    let script = r#"
read line
id=$(printf '%s' "$line" | sed 's/.*"request_id":"\([^"]*\)".*/\1/')
printf '{"type":"control_response","response":{"subtype":"success","request_id":"%s","response":{"commands":[]}}}\n' "$id"
cat >/dev/null
"#;
    let session = within(Session::spawn(scripted(script))).await.unwrap();
    let cancel = CancellationToken::new();

    let info = within(session.initialize(&cancel)).await.unwrap();
    assert_eq!(info["commands"], serde_json::json!([]));
    assert_eq!(session.state(), SessionState::Running);

    within(session.close()).await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_child_exit_ends_stream() {
    let session = within(Session::spawn(scripted("exit 0"))).await.unwrap();

    let next = within(session.next_message(&CancellationToken::new()))
        .await
        .unwrap();
    assert!(next.is_none());
    within(session.close()).await.unwrap();
}

#[tokio::test]
async fn test_child_runs_in_configured_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let script = r#"
printf '{"type":"system","subtype":"init","uuid":"s1","session_id":"cli","cwd":"%s","tools":[]}\n' "$(pwd -P)"
cat >/dev/null
"#;
    let process = ProcessConfig::new("sh")
        .with_args(["-c", script])
        .with_cwd(dir.path());
    let session = within(Session::spawn(SessionConfig::new(process)))
        .await
        .unwrap();

    let message = within(session.next_message(&CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    let Message::System(SystemMessage::Init(init)) = message else {
        panic!("expected system init, got {message:?}");
    };
    assert_eq!(
        std::path::Path::new(init.cwd.as_deref().unwrap()).canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
    within(session.close()).await.unwrap();
}
