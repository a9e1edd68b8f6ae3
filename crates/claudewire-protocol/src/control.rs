//! Control-channel envelopes
//!
//! Control requests flow both ways. The engine sends [`ControlRequestBody`]
//! requests (interrupt, initialize, model switches, and queries) and the peer
//! sends [`PeerRequest`]s (permission checks, hook callbacks, MCP traffic).
//! Every request is answered by exactly one [`ControlResponse`] carrying the
//! same `request_id`.

use crate::codec::{peek_str, take_field};
use crate::hooks::{HookEvent, HookMatcherConfig};
use crate::types::PermissionMode;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A control request envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "control_request")]
pub struct ControlRequest<B> {
    /// Correlation id, echoed by the response
    pub request_id: String,

    /// Subtype-tagged body
    pub request: B,

    /// Unique id of this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Owning session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl<B> ControlRequest<B> {
    /// Create a request envelope
    pub fn new(request_id: impl Into<String>, request: B) -> Self {
        Self {
            request_id: request_id.into(),
            request,
            uuid: None,
            session_id: None,
        }
    }

    /// Attach the owning session
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Requests the engine sends to the peer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype")]
pub enum ControlRequestBody {
    /// Stop the current turn
    #[serde(rename = "interrupt")]
    Interrupt,

    /// Session handshake, registering hook callbacks
    #[serde(rename = "initialize")]
    Initialize {
        /// Hook matchers keyed by event
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hooks: Option<BTreeMap<HookEvent, Vec<HookMatcherConfig>>>,
    },

    /// Change the permission mode
    #[serde(rename = "set_permission_mode")]
    SetPermissionMode {
        /// New mode
        mode: PermissionMode,
    },

    /// Change the model; `None` restores the default
    #[serde(rename = "setModel")]
    SetModel {
        /// Model identifier
        model: Option<String>,
    },

    /// Change the thinking budget; `None` clears it
    #[serde(rename = "setMaxThinkingTokens")]
    SetMaxThinkingTokens {
        /// Token budget
        #[serde(rename = "maxThinkingTokens")]
        max_thinking_tokens: Option<u32>,
    },

    /// Query account details
    #[serde(rename = "accountInfo")]
    AccountInfo,

    /// Query available slash commands
    #[serde(rename = "supportedCommands")]
    SupportedCommands,

    /// Query available models
    #[serde(rename = "supportedModels")]
    SupportedModels,

    /// Query MCP server status
    #[serde(rename = "mcpServerStatus")]
    McpServerStatus,
}

impl ControlRequestBody {
    /// Wire `subtype`
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Initialize { .. } => "initialize",
            Self::SetPermissionMode { .. } => "set_permission_mode",
            Self::SetModel { .. } => "setModel",
            Self::SetMaxThinkingTokens { .. } => "setMaxThinkingTokens",
            Self::AccountInfo => "accountInfo",
            Self::SupportedCommands => "supportedCommands",
            Self::SupportedModels => "supportedModels",
            Self::McpServerStatus => "mcpServerStatus",
        }
    }
}

/// A `can_use_tool` permission check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanUseToolRequest {
    /// Tool being invoked
    pub tool_name: String,

    /// Tool input
    pub input: Value,

    /// Permission updates the peer suggests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_suggestions: Vec<Value>,

    /// Path that triggered the check, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_path: Option<String>,

    /// Tool use being checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,

    /// Subagent making the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Why the peer is asking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_reason: Option<String>,
}

/// A `hook_callback` invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookCallbackRequest {
    /// Id assigned during `initialize`
    pub callback_id: String,

    /// Event-specific hook input
    pub input: Value,

    /// Tool use the hook fires for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

/// Requests the peer sends to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    /// Ask whether a tool may run
    CanUseTool(CanUseToolRequest),

    /// Invoke a registered hook
    HookCallback(HookCallbackRequest),

    /// Route a JSON-RPC message to an in-process MCP server
    McpMessage {
        /// Target server
        server_name: String,
        /// JSON-RPC payload
        message: Value,
    },

    /// A subtype this engine does not handle
    Other {
        /// Wire `subtype`
        subtype: String,
        /// Remaining body fields
        payload: Map<String, Value>,
    },
}

impl PeerRequest {
    /// Wire `subtype`
    pub fn subtype(&self) -> &str {
        match self {
            Self::CanUseTool(_) => "can_use_tool",
            Self::HookCallback(_) => "hook_callback",
            Self::McpMessage { .. } => "mcp_message",
            Self::Other { subtype, .. } => subtype,
        }
    }

    fn from_value(mut value: Value) -> Result<Self, String> {
        let subtype = peek_str(&value, "subtype")
            .ok_or("control request body is missing `subtype`")?
            .to_owned();

        Ok(match subtype.as_str() {
            "can_use_tool" => Self::CanUseTool(
                serde_json::from_value(value).map_err(|e| format!("can_use_tool: {e}"))?,
            ),
            "hook_callback" => Self::HookCallback(
                serde_json::from_value(value).map_err(|e| format!("hook_callback: {e}"))?,
            ),
            "mcp_message" => Self::McpMessage {
                server_name: take_field(&mut value, "server_name")?,
                message: take_field(&mut value, "message")?,
            },
            _ => {
                let Value::Object(mut payload) = value else {
                    return Err("control request body must be an object".to_string());
                };
                payload.remove("subtype");
                Self::Other { subtype, payload }
            }
        })
    }
}

#[derive(Serialize)]
struct SubtypeWire<'a, T> {
    subtype: &'a str,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct McpMessageWire<'a> {
    server_name: &'a str,
    message: &'a Value,
}

impl Serialize for PeerRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let subtype = self.subtype();
        match self {
            Self::CanUseTool(body) => SubtypeWire { subtype, body }.serialize(serializer),
            Self::HookCallback(body) => SubtypeWire { subtype, body }.serialize(serializer),
            Self::McpMessage {
                server_name,
                message,
            } => SubtypeWire {
                subtype,
                body: McpMessageWire {
                    server_name,
                    message,
                },
            }
            .serialize(serializer),
            Self::Other { payload, .. } => SubtypeWire {
                subtype,
                body: payload,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PeerRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

/// A control response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "control_response")]
pub struct ControlResponse {
    /// Outcome
    pub response: ControlResponseBody,

    /// Unique id of this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Owning session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Outcome of a control request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponseBody {
    /// The request succeeded
    Success {
        /// Id of the answered request
        request_id: String,
        /// Subtype-specific payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },

    /// The request failed
    Error {
        /// Id of the answered request
        request_id: String,
        /// Failure description
        error: String,
    },
}

impl ControlResponse {
    /// Success response with an optional payload
    pub fn success(request_id: impl Into<String>, response: Option<Value>) -> Self {
        Self::from_body(ControlResponseBody::Success {
            request_id: request_id.into(),
            response,
        })
    }

    /// Error response
    pub fn error(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::from_body(ControlResponseBody::Error {
            request_id: request_id.into(),
            error: error.into(),
        })
    }

    fn from_body(response: ControlResponseBody) -> Self {
        Self {
            response,
            uuid: None,
            session_id: None,
        }
    }

    /// Id of the answered request
    pub fn request_id(&self) -> &str {
        match &self.response {
            ControlResponseBody::Success { request_id, .. }
            | ControlResponseBody::Error { request_id, .. } => request_id,
        }
    }

    /// Attach the owning session
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Split into the payload or the error string
    pub fn into_result(self) -> Result<Option<Value>, String> {
        match self.response {
            ControlResponseBody::Success { response, .. } => Ok(response),
            ControlResponseBody::Error { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interrupt_wire_shape() {
        let req = ControlRequest::new("req_1_abcd", ControlRequestBody::Interrupt);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "type": "control_request",
                "request_id": "req_1_abcd",
                "request": {"subtype": "interrupt"}
            })
        );
    }

    #[test]
    fn test_set_model_emits_null() {
        let body = ControlRequestBody::SetModel { model: None };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"subtype": "setModel", "model": null})
        );
        let body = ControlRequestBody::SetMaxThinkingTokens {
            max_thinking_tokens: Some(2048),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"subtype": "setMaxThinkingTokens", "maxThinkingTokens": 2048})
        );
    }

    #[test]
    fn test_initialize_hook_table() {
        let mut hooks = BTreeMap::new();
        hooks.insert(
            HookEvent::PreToolUse,
            vec![HookMatcherConfig {
                matcher: Some("Bash".into()),
                hook_callback_ids: vec!["hook_0".into()],
            }],
        );
        let body = ControlRequestBody::Initialize { hooks: Some(hooks) };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["subtype"], "initialize");
        assert_eq!(json["hooks"]["PreToolUse"][0]["matcher"], "Bash");
        assert_eq!(json["hooks"]["PreToolUse"][0]["hookCallbackIds"][0], "hook_0");
    }

    #[test]
    fn test_can_use_tool_decodes() {
        let req: ControlRequest<PeerRequest> = serde_json::from_value(json!({
            "type": "control_request",
            "request_id": "cli_1",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Bash",
                "input": {"command": "ls"},
                "permission_suggestions": []
            }
        }))
        .unwrap();
        let PeerRequest::CanUseTool(body) = &req.request else {
            panic!("expected can_use_tool");
        };
        assert_eq!(body.tool_name, "Bash");
        assert_eq!(body.input["command"], "ls");
    }

    #[test]
    fn test_unknown_peer_subtype_kept() {
        let body: PeerRequest = serde_json::from_value(json!({
            "subtype": "rewind_files",
            "user_message_id": "m1"
        }))
        .unwrap();
        assert_eq!(body.subtype(), "rewind_files");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"subtype": "rewind_files", "user_message_id": "m1"})
        );
    }

    #[test]
    fn test_mcp_message_round_trip() {
        let body = PeerRequest::McpMessage {
            server_name: "calc".into(),
            message: json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["subtype"], "mcp_message");
        assert_eq!(serde_json::from_value::<PeerRequest>(json).unwrap(), body);
    }

    #[test]
    fn test_response_shapes() {
        let ok = ControlResponse::success("r1", Some(json!({"allow": true})));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({
                "type": "control_response",
                "response": {"subtype": "success", "request_id": "r1", "response": {"allow": true}}
            })
        );

        let err = ControlResponse::error("r2", "no handler");
        assert_eq!(err.request_id(), "r2");
        assert_eq!(err.into_result(), Err("no handler".to_string()));
    }
}
