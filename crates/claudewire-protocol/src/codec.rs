//! Frame-level encoding and decoding
//!
//! A frame is one JSON object without its trailing newline. Decoding peeks the
//! top-level `type` first and only then decodes the matching variant, so an
//! error always names the tag that failed instead of a list of untagged
//! candidates.

use crate::control::{ControlRequest, ControlRequestBody, ControlResponse, PeerRequest};
use crate::error::{DecodeErrorKind, ProtocolError, Result};
use crate::message::{
    AssistantMessage, AuthStatusMessage, Message, ResultMessage, StreamEvent, SystemMessage,
    ToolProgressMessage, UserMessage,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Anything the peer can send
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Inbound {
    /// A session message
    Message(Message),

    /// A control request initiated by the peer
    ControlRequest(ControlRequest<PeerRequest>),

    /// A response to a control request the engine sent
    ControlResponse(ControlResponse),
}

/// Anything the engine can send
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Outbound {
    /// A user turn
    User(UserMessage),

    /// A control request initiated by the engine
    ControlRequest(ControlRequest<ControlRequestBody>),

    /// A response to a peer-initiated control request
    ControlResponse(ControlResponse),
}

/// Decode one inbound frame
pub fn decode_frame(frame: &[u8]) -> Result<Inbound> {
    let value = parse_envelope(frame)?;
    let tag = envelope_type(&value)?;

    match tag.as_str() {
        "control_request" => {
            let request_id = peek_str(&value, "request_id").map(str::to_owned);
            let subtype = value
                .get("request")
                .and_then(|r| peek_str(r, "subtype"))
                .map(str::to_owned);
            serde_json::from_value(value)
                .map(Inbound::ControlRequest)
                .map_err(|e| {
                    let mut err = ProtocolError::from_json(DecodeErrorKind::InvalidPayload, e)
                        .with_message_type("control_request");
                    if let Some(id) = request_id {
                        err = err.with_request_id(id);
                    }
                    if let Some(subtype) = subtype {
                        err = err.with_subtype(subtype);
                    }
                    err
                })
        }
        "control_response" => decode_control_response(value).map(Inbound::ControlResponse),
        _ => decode_message(value).map(Inbound::Message),
    }
}

/// Decode one outbound frame, as the peer would see it
pub fn decode_outbound(frame: &[u8]) -> Result<Outbound> {
    let value = parse_envelope(frame)?;
    let tag = envelope_type(&value)?;

    match tag.as_str() {
        "user" => decode_variant::<UserMessage>(value, "user").map(Outbound::User),
        "control_request" => {
            decode_variant(value, "control_request").map(Outbound::ControlRequest)
        }
        "control_response" => decode_control_response(value).map(Outbound::ControlResponse),
        other => Err(ProtocolError::decode(
            DecodeErrorKind::UnknownMessageType,
            format!("`{other}` is not an outbound message type"),
        )
        .with_message_type(other)),
    }
}

/// Encode a value as one frame, without the trailing newline
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| ProtocolError::Encode {
        message_type: std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string(),
        source,
    })
}

/// Decode a session message from an already-parsed envelope
pub fn decode_message(value: Value) -> Result<Message> {
    let tag = envelope_type(&value)?;
    let session_id = peek_str(&value, "session_id").map(str::to_owned);

    let decoded = match tag.as_str() {
        "user" => decode_variant::<UserMessage>(value, "user").map(Message::User),
        "assistant" => decode_variant::<AssistantMessage>(value, "assistant").map(Message::Assistant),
        "system" => {
            let subtype = peek_str(&value, "subtype").map(str::to_owned);
            decode_variant::<SystemMessage>(value, "system")
                .map(Message::System)
                .map_err(|err| match subtype {
                    Some(subtype) => err.with_subtype(subtype),
                    None => err,
                })
        }
        "stream_event" => {
            decode_variant::<StreamEvent>(value, "stream_event").map(Message::StreamEvent)
        }
        "result" => decode_variant::<ResultMessage>(value, "result").map(Message::Result),
        "tool_progress" => {
            decode_variant::<ToolProgressMessage>(value, "tool_progress").map(Message::ToolProgress)
        }
        "auth_status" => {
            decode_variant::<AuthStatusMessage>(value, "auth_status").map(Message::AuthStatus)
        }
        other => Err(ProtocolError::decode(
            DecodeErrorKind::UnknownMessageType,
            format!("unknown message type `{other}`"),
        )
        .with_message_type(other)),
    };

    decoded.map_err(|err| match session_id {
        Some(id) => err.with_session_id(id),
        None => err,
    })
}

fn decode_control_response(value: Value) -> Result<ControlResponse> {
    let body = value.get("response");
    let request_id = body.and_then(|r| peek_str(r, "request_id")).map(str::to_owned);
    let subtype = body.and_then(|r| peek_str(r, "subtype")).map(str::to_owned);

    let result = match subtype.as_deref() {
        Some("success" | "error") | None => decode_variant(value, "control_response"),
        Some(other) => Err(ProtocolError::decode(
            DecodeErrorKind::UnknownSubtype,
            format!("unknown control response subtype `{other}`"),
        )
        .with_message_type("control_response")
        .with_subtype(other)),
    };
    result.map_err(|err| match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    })
}

fn decode_variant<T: DeserializeOwned>(value: Value, message_type: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ProtocolError::from_json(DecodeErrorKind::InvalidPayload, e).with_message_type(message_type)
    })
}

fn parse_envelope(frame: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(frame.trim_ascii())
        .map_err(|e| ProtocolError::from_json(DecodeErrorKind::InvalidEnvelope, e))?;
    if !value.is_object() {
        return Err(ProtocolError::decode(
            DecodeErrorKind::InvalidEnvelope,
            format!("frame must be a JSON object, got {}", crate::content::json_kind(&value)),
        ));
    }
    Ok(value)
}

fn envelope_type(value: &Value) -> Result<String> {
    match value.get("type") {
        Some(Value::String(tag)) => Ok(tag.clone()),
        Some(other) => Err(ProtocolError::decode(
            DecodeErrorKind::InvalidEnvelope,
            format!("`type` must be a string, got {}", crate::content::json_kind(other)),
        )),
        None => Err(ProtocolError::decode(
            DecodeErrorKind::InvalidEnvelope,
            "frame is missing `type`",
        )),
    }
}

/// String value of `field`, if `value` is an object holding a string there
pub(crate) fn peek_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

/// Move `field` out of `value` and decode it
pub(crate) fn take_field<T: DeserializeOwned>(
    value: &mut Value,
    field: &str,
) -> std::result::Result<T, String> {
    let raw = value
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| format!("missing field `{field}`"))?;
    serde_json::from_value(raw).map_err(|e| format!("field `{field}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::not_json(b"{not json".as_slice())]
    #[case::array(b"[1,2]".as_slice())]
    #[case::missing_type(br#"{"uuid":"u"}"#.as_slice())]
    #[case::numeric_type(br#"{"type":3}"#.as_slice())]
    fn test_bad_envelopes(#[case] frame: &[u8]) {
        let err = decode_frame(frame).unwrap_err();
        assert_eq!(err.kind(), Some(DecodeErrorKind::InvalidEnvelope));
        assert_eq!(err.code(), "message_parse_failed");
    }

    #[test]
    fn test_unknown_type_is_named() {
        let err = decode_frame(br#"{"type":"telepathy","uuid":"u","session_id":"s"}"#).unwrap_err();
        assert_eq!(err.kind(), Some(DecodeErrorKind::UnknownMessageType));
        assert_eq!(err.context().unwrap().message_type.as_deref(), Some("telepathy"));
        assert_eq!(err.context().unwrap().session_id.as_deref(), Some("s"));
        assert!(err.to_string().contains("telepathy"));
    }

    #[test]
    fn test_invalid_payload_carries_type() {
        let err = decode_frame(br#"{"type":"result","uuid":"u","session_id":"s"}"#).unwrap_err();
        assert_eq!(err.kind(), Some(DecodeErrorKind::InvalidPayload));
        assert_eq!(err.context().unwrap().message_type.as_deref(), Some("result"));
    }

    #[test]
    fn test_trailing_whitespace_tolerated() {
        let frame = b"{\"type\":\"control_response\",\"response\":{\"subtype\":\"success\",\"request_id\":\"r\"}}\r\n";
        assert!(matches!(
            decode_frame(frame).unwrap(),
            Inbound::ControlResponse(_)
        ));
    }

    #[test]
    fn test_unknown_response_subtype() {
        let err = decode_frame(
            br#"{"type":"control_response","response":{"subtype":"maybe","request_id":"req_9_00000000"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), Some(DecodeErrorKind::UnknownSubtype));
        let ctx = err.context().unwrap();
        assert_eq!(ctx.request_id.as_deref(), Some("req_9_00000000"));
        assert_eq!(ctx.subtype.as_deref(), Some("maybe"));
    }

    #[test]
    fn test_encode_has_no_newline() {
        let bytes = encode(&json!({"type": "x"})).unwrap();
        assert!(!bytes.contains(&b'\n'));
    }

    #[test]
    fn test_take_field_reports_missing() {
        let mut value = json!({"a": 1});
        assert_eq!(take_field::<u32>(&mut value, "a").unwrap(), 1);
        assert_eq!(
            take_field::<u32>(&mut value, "b").unwrap_err(),
            "missing field `b`"
        );
    }
}
