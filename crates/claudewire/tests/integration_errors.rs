//! Integration tests for terminal failures and shutdown
//!
//! A receive failure is reported once, in band, as an error result; then the
//! session closes itself. End of stream is not a failure.

mod common;

use claudewire::testing::mock_pair;
use claudewire::{Message, Session, SessionConfig, SessionError, SessionState};
use claudewire_transport::{DEFAULT_MAX_FRAME_SIZE, FramedTransport, TransportError};
use common::{assistant, mock_session, within};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn wait_closed(session: &Session) {
    within(async {
        while session.state() != SessionState::Closed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
}

async fn drain(session: &Session) -> Vec<Message> {
    let cancel = CancellationToken::new();
    let mut messages = Vec::new();
    while let Some(message) = within(session.next_message(&cancel)).await.unwrap() {
        messages.push(message);
    }
    messages
}

fn single_error(messages: &[Message]) -> &str {
    let errors: Vec<&str> = messages
        .iter()
        .filter_map(|message| match message {
            Message::Result(result) if result.is_error => {
                assert_eq!(result.subtype, "error_during_execution");
                result.errors.as_ref().map(|errors| errors[0].as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1, "expected exactly one error result");
    errors[0]
}

// ============================================================================
// TERMINAL FAILURES
// ============================================================================

#[tokio::test]
async fn test_read_failure_surfaces_once_then_closes() {
    let (session, peer) = mock_session(SessionConfig::default());
    let id = session.session_id().to_string();

    peer.send(&assistant(&id, "partial"));
    peer.fail_read(TransportError::Read(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "pipe reset",
    )));

    let messages = drain(&session).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].type_name(), "assistant");
    let error = single_error(&messages);
    assert!(error.starts_with("transport/read_failed: "), "{error}");
    assert_eq!(messages[1].session_id(), id);

    wait_closed(&session).await;
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_pipe_reset_over_framed_transport() {
    let mut first = serde_json::to_vec(&assistant("cli", "before reset")).unwrap();
    first.push(b'\n');
    let child_stdout = tokio_test::io::Builder::new()
        .read(&first)
        .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "child went away"))
        .build();
    let transport = FramedTransport::new(
        Box::new(child_stdout),
        Box::new(tokio::io::sink()),
        DEFAULT_MAX_FRAME_SIZE,
    );
    let session = Session::with_transport(Arc::new(transport), SessionConfig::default()).unwrap();

    let messages = drain(&session).await;
    assert_eq!(messages[0].type_name(), "assistant");
    let error = single_error(&messages);
    assert!(error.contains("child went away"), "{error}");
    wait_closed(&session).await;
}

#[tokio::test]
async fn test_oversized_frame_is_terminal() {
    let (session, peer) = mock_session(SessionConfig::default());

    peer.fail_read(TransportError::FrameTooLarge {
        limit: 1024,
        actual: 1025,
        operation: "json_accumulation",
    });

    let messages = drain(&session).await;
    let error = single_error(&messages);
    assert!(error.starts_with("transport/frame_too_large: "), "{error}");
    assert!(error.contains("limit=1024 bytes"));
    wait_closed(&session).await;
}

#[tokio::test]
async fn test_malformed_json_is_terminal() {
    let (session, peer) = mock_session(SessionConfig::default());

    peer.send_raw("{not json");

    let messages = drain(&session).await;
    let error = single_error(&messages);
    assert!(error.starts_with("protocol/message_parse_failed: "), "{error}");
    wait_closed(&session).await;
}

#[tokio::test]
async fn test_unknown_message_type_is_terminal() {
    let (session, peer) = mock_session(SessionConfig::default());

    peer.send_raw(r#"{"type":"telemetry","uuid":"t1","session_id":"s"}"#);

    let messages = drain(&session).await;
    let error = single_error(&messages);
    assert!(error.starts_with("protocol/unknown_message_type: "), "{error}");
    wait_closed(&session).await;
}

#[tokio::test]
async fn test_failure_unblocks_pending_request() {
    let (session, mut peer) = mock_session(SessionConfig::default());
    let cancel = CancellationToken::new();

    let failing_peer = async {
        peer.next_frame().await.unwrap();
        peer.fail_read(TransportError::Read(io::Error::other("gone")));
    };
    let (result, ()) = within(async { tokio::join!(session.interrupt(&cancel), failing_peer) }).await;

    assert!(matches!(result.unwrap_err(), SessionError::Closed));
}

// ============================================================================
// END OF STREAM
// ============================================================================

#[tokio::test]
async fn test_end_of_stream_is_not_an_error() {
    let (session, peer) = mock_session(SessionConfig::default());
    let id = session.session_id().to_string();

    peer.send(&assistant(&id, "last words"));
    peer.end_stream();

    let messages = drain(&session).await;
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].is_result());
    assert!(!session.is_closed());

    session.close().await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

// ============================================================================
// CLOSE
// ============================================================================

#[tokio::test]
async fn test_close_is_idempotent_and_concurrent() {
    let (transport, peer) = mock_pair();
    let session = Session::with_transport(transport.clone(), SessionConfig::default()).unwrap();

    let (a, b, c) = within(async { tokio::join!(session.close(), session.close(), session.close()) }).await;
    a.unwrap();
    b.unwrap();
    c.unwrap();
    session.close().await.unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(transport.close_count(), 1);
    assert!(peer.is_closed());
}

#[tokio::test]
async fn test_close_ends_message_stream() {
    let (session, _peer) = mock_session(SessionConfig::default());
    let cancel = CancellationToken::new();

    let (next, closed) = within(async { tokio::join!(session.next_message(&cancel), session.close()) }).await;

    closed.unwrap();
    assert!(next.unwrap().is_none());
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_invalid_config_rejected() {
    let (transport, _peer) = mock_pair();
    let err = Session::with_transport(transport, SessionConfig::default().with_message_buffer(0))
        .unwrap_err();
    assert!(matches!(err, SessionError::Config(_)));
    assert_eq!(err.category(), "client");
}
