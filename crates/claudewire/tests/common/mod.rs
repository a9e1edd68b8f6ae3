//! Shared fixtures for session tests

#![allow(dead_code)]

use claudewire::testing::{MockPeer, mock_pair};
use claudewire::{Session, SessionConfig};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

/// Fail the test instead of hanging
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Session over a mock transport
pub fn mock_session(config: SessionConfig) -> (Session, MockPeer) {
    let (transport, peer) = mock_pair();
    let session = Session::with_transport(transport, config).unwrap();
    (session, peer)
}

pub fn assistant(session_id: &str, text: &str) -> Value {
    json!({
        "type": "assistant",
        "uuid": format!("a-{text}"),
        "session_id": session_id,
        "message": {
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 1}
        }
    })
}

pub fn system_init(session_id: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "init",
        "uuid": "s-init",
        "session_id": session_id,
        "model": "claude-sonnet-4-5",
        "cwd": "/tmp",
        "tools": ["Bash", "Read"],
        "permissionMode": "default"
    })
}

pub fn result(session_id: &str, text: &str) -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "uuid": "r-1",
        "session_id": session_id,
        "is_error": false,
        "num_turns": 1,
        "result": text,
        "total_cost_usd": 0.0012
    })
}

pub fn control_request(request_id: &str, request: Value) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": request
    })
}

pub fn success_response(request_id: &str, response: Value) -> Value {
    json!({
        "type": "control_response",
        "response": {"subtype": "success", "request_id": request_id, "response": response}
    })
}
