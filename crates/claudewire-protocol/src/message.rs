//! Session message types
//!
//! Every message is a JSON object whose top-level `type` selects the variant.
//! Each envelope struct stamps its own `type` on encode, so a caller can never
//! emit a `user` body under a different tag.

use crate::content::ContentBlock;
use crate::stream::StreamEventPayload;
use crate::types::{ModelUsage, PermissionMode, Usage};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Result subtypes reported by the peer
pub mod result_subtype {
    /// The turn completed normally.
    pub const SUCCESS: &str = "success";
    /// The turn limit was reached.
    pub const ERROR_MAX_TURNS: &str = "error_max_turns";
    /// The budget limit was reached.
    pub const ERROR_MAX_BUDGET_USD: &str = "error_max_budget_usd";
    /// Structured output could not be produced.
    pub const ERROR_MAX_STRUCTURED_OUTPUT_RETRIES: &str = "error_max_structured_output_retries";
    /// Execution failed, including local transport and decode failures.
    pub const ERROR_DURING_EXECUTION: &str = "error_during_execution";
}

/// A typed session message
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Message {
    /// User turn, sent by the engine or echoed by the peer
    User(UserMessage),

    /// Complete assistant turn
    Assistant(AssistantMessage),

    /// System notification
    System(SystemMessage),

    /// Partial-content streaming event
    StreamEvent(StreamEvent),

    /// Terminal outcome of a query
    Result(ResultMessage),

    /// Long-running tool heartbeat
    ToolProgress(ToolProgressMessage),

    /// Authentication progress for MCP servers
    AuthStatus(AuthStatusMessage),
}

impl Message {
    /// Wire `type` of this message
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::System(_) => "system",
            Self::StreamEvent(_) => "stream_event",
            Self::Result(_) => "result",
            Self::ToolProgress(_) => "tool_progress",
            Self::AuthStatus(_) => "auth_status",
        }
    }

    /// Session the message belongs to
    pub fn session_id(&self) -> &str {
        match self {
            Self::User(m) => &m.session_id,
            Self::Assistant(m) => &m.session_id,
            Self::System(m) => m.session_id(),
            Self::StreamEvent(m) => &m.session_id,
            Self::Result(m) => &m.session_id,
            Self::ToolProgress(m) => &m.session_id,
            Self::AuthStatus(m) => &m.session_id,
        }
    }

    /// Per-frame unique id
    pub fn uuid(&self) -> &str {
        match self {
            Self::User(m) => &m.uuid,
            Self::Assistant(m) => &m.uuid,
            Self::System(m) => m.uuid(),
            Self::StreamEvent(m) => &m.uuid,
            Self::Result(m) => &m.uuid,
            Self::ToolProgress(m) => &m.uuid,
            Self::AuthStatus(m) => &m.uuid,
        }
    }

    /// Whether this is the terminal `result` message
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        crate::codec::decode_message(value).map_err(D::Error::custom)
    }
}

/// Message author role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,
}

/// A user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "user")]
pub struct UserMessage {
    /// Unique id of this frame
    pub uuid: String,

    /// Owning session
    pub session_id: String,

    /// The API-shaped message body
    pub message: UserPayload,

    /// Tool use this message answers, for subagent traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,

    /// Set by the peer for messages it synthesised itself
    #[serde(default, rename = "isSynthetic", skip_serializing_if = "Option::is_none")]
    pub is_synthetic: Option<bool>,
}

/// Body of a user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPayload {
    /// Always `user`
    pub role: MessageRole,

    /// Content blocks
    pub content: Vec<ContentBlock>,
}

impl UserMessage {
    /// Create a user message with a fresh uuid
    pub fn new(session_id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            message: UserPayload {
                role: MessageRole::User,
                content,
            },
            parent_tool_use_id: None,
            is_synthetic: None,
        }
    }

    /// Create a user message holding a single text block
    pub fn text(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(session_id, vec![ContentBlock::text(text)])
    }
}

/// A complete assistant turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "assistant")]
pub struct AssistantMessage {
    /// Unique id of this frame
    pub uuid: String,

    /// Owning session
    pub session_id: String,

    /// The API-shaped message body
    pub message: AssistantPayload,

    /// Tool use this message answers, for subagent traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
}

impl AssistantMessage {
    /// All text blocks joined by newlines
    pub fn text(&self) -> String {
        self.message
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// API-shaped assistant message, also carried by `message_start` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantPayload {
    /// API message id
    pub id: String,

    /// Always `message`
    #[serde(rename = "type", default = "default_payload_type")]
    pub message_type: String,

    /// Always `assistant`
    pub role: MessageRole,

    /// Content blocks
    #[serde(default)]
    pub content: Vec<ContentBlock>,

    /// Model that produced the turn
    pub model: String,

    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Stop sequence that ended generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,

    /// Token usage
    #[serde(default)]
    pub usage: Usage,
}

fn default_payload_type() -> String {
    "message".to_string()
}

/// A system notification, decoded by `subtype`
#[derive(Debug, Clone, PartialEq)]
pub enum SystemMessage {
    /// Session initialisation report
    Init(SystemInit),

    /// Transcript compaction marker
    CompactBoundary(CompactBoundary),

    /// Any subtype without a typed shape
    Other(RawSystemMessage),
}

impl SystemMessage {
    /// Wire `subtype`
    pub fn subtype(&self) -> &str {
        match self {
            Self::Init(_) => "init",
            Self::CompactBoundary(_) => "compact_boundary",
            Self::Other(raw) => &raw.subtype,
        }
    }

    fn session_id(&self) -> &str {
        match self {
            Self::Init(m) => &m.session_id,
            Self::CompactBoundary(m) => &m.session_id,
            Self::Other(m) => &m.session_id,
        }
    }

    fn uuid(&self) -> &str {
        match self {
            Self::Init(m) => &m.uuid,
            Self::CompactBoundary(m) => &m.uuid,
            Self::Other(m) => &m.uuid,
        }
    }
}

#[derive(Serialize)]
struct SystemWire<'a, T> {
    #[serde(rename = "type")]
    kind: &'static str,
    subtype: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for SystemMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let subtype = self.subtype();
        match self {
            Self::Init(body) => SystemWire {
                kind: "system",
                subtype,
                body,
            }
            .serialize(serializer),
            Self::CompactBoundary(body) => SystemWire {
                kind: "system",
                subtype,
                body,
            }
            .serialize(serializer),
            Self::Other(body) => SystemWire {
                kind: "system",
                subtype,
                body,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SystemMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let subtype = crate::codec::peek_str(&value, "subtype")
            .ok_or_else(|| D::Error::custom("system message is missing `subtype`"))?
            .to_owned();

        match subtype.as_str() {
            "init" => serde_json::from_value(value).map(Self::Init),
            "compact_boundary" => serde_json::from_value(value).map(Self::CompactBoundary),
            _ => {
                let map = value
                    .as_object_mut()
                    .ok_or_else(|| D::Error::custom("system message must be an object"))?;
                let uuid = take_string(map, "uuid").map_err(D::Error::custom)?;
                let session_id = take_string(map, "session_id").map_err(D::Error::custom)?;
                map.remove("type");
                map.remove("subtype");
                Ok(Self::Other(RawSystemMessage {
                    uuid,
                    session_id,
                    subtype,
                    data: std::mem::take(map),
                }))
            }
        }
        .map_err(D::Error::custom)
    }
}

fn take_string(map: &mut Map<String, Value>, field: &str) -> Result<String, String> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("field `{field}` must be a string")),
        None => Err(format!("missing field `{field}`")),
    }
}

/// `system`/`init`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SystemInit {
    /// Unique id of this frame
    pub uuid: String,
    /// Owning session
    pub session_id: String,
    /// Names of available subagents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<String>>,
    /// Where the API key came from
    #[serde(default, rename = "apiKeySource", skip_serializing_if = "Option::is_none")]
    pub api_key_source: Option<String>,
    /// Working directory of the peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Tools available this session
    #[serde(default)]
    pub tools: Vec<String>,
    /// MCP servers and their connection status
    #[serde(default)]
    pub mcp_servers: Vec<McpServerSummary>,
    /// Active model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Active permission mode
    #[serde(default, rename = "permissionMode", skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
    /// Slash commands available this session
    #[serde(default)]
    pub slash_commands: Vec<String>,
    /// Active output style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_style: Option<String>,
}

/// Name and status of an MCP server as listed in `init`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerSummary {
    /// Server name
    pub name: String,
    /// Connection status
    pub status: String,
}

/// `system`/`compact_boundary`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactBoundary {
    /// Unique id of this frame
    pub uuid: String,
    /// Owning session
    pub session_id: String,
    /// Why and how much was compacted
    pub compact_metadata: CompactMetadata,
}

/// Compaction details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompactMetadata {
    /// "manual" or "auto"
    pub trigger: String,
    /// Token count before compaction
    pub pre_tokens: u64,
}

/// A system message kept in raw form
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RawSystemMessage {
    /// Unique id of this frame
    pub uuid: String,
    /// Owning session
    pub session_id: String,
    /// Wire `subtype`
    #[serde(skip)]
    pub subtype: String,
    /// Every other field of the envelope
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// A partial-content streaming event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "stream_event")]
pub struct StreamEvent {
    /// Unique id of this frame
    pub uuid: String,

    /// Owning session
    pub session_id: String,

    /// The streamed API event
    pub event: StreamEventPayload,

    /// Tool use this event belongs to, for subagent traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
}

/// A tool call the peer refused
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionDenial {
    /// Tool name
    pub tool_name: String,
    /// Tool use id
    pub tool_use_id: String,
    /// Input the tool was called with
    #[serde(default)]
    pub tool_input: Value,
}

/// The terminal outcome of a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "result")]
pub struct ResultMessage {
    /// Unique id of this frame
    pub uuid: String,

    /// Owning session
    pub session_id: String,

    /// See [`result_subtype`]
    pub subtype: String,

    /// Wall-clock duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    /// API duration in milliseconds
    #[serde(default)]
    pub duration_api_ms: u64,

    /// Whether the result is an error
    pub is_error: bool,

    /// Number of turns taken
    #[serde(default)]
    pub num_turns: u32,

    /// Total cost in USD
    #[serde(default)]
    pub total_cost_usd: f64,

    /// Aggregate token usage
    #[serde(default)]
    pub usage: Usage,

    /// Usage broken down per model
    #[serde(default, rename = "modelUsage", skip_serializing_if = "HashMap::is_empty")]
    pub model_usage: HashMap<String, ModelUsage>,

    /// Tool calls that were denied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_denials: Vec<PermissionDenial>,

    /// Final text result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Structured output, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<Value>,

    /// Error descriptions for error subtypes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl ResultMessage {
    /// Create a result message with zeroed metrics
    pub fn new(session_id: impl Into<String>, subtype: impl Into<String>, is_error: bool) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            subtype: subtype.into(),
            duration_ms: 0,
            duration_api_ms: 0,
            is_error,
            num_turns: 0,
            total_cost_usd: 0.0,
            usage: Usage::default(),
            model_usage: HashMap::new(),
            permission_denials: Vec::new(),
            result: None,
            structured_output: None,
            errors: None,
        }
    }

    /// Error-shaped result used to surface a local failure in-band
    pub fn error_during_execution(session_id: impl Into<String>, error: impl Into<String>) -> Self {
        let mut msg = Self::new(session_id, result_subtype::ERROR_DURING_EXECUTION, true);
        msg.errors = Some(vec![error.into()]);
        msg
    }

    /// Set the result text
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Set the total cost
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.total_cost_usd = cost;
        self
    }

    /// Whether the query succeeded
    pub fn is_success(&self) -> bool {
        self.subtype == result_subtype::SUCCESS && !self.is_error
    }
}

/// Heartbeat for a long-running tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "tool_progress")]
pub struct ToolProgressMessage {
    /// Unique id of this frame
    pub uuid: String,
    /// Owning session
    pub session_id: String,
    /// Tool use being reported on
    pub tool_use_id: String,
    /// Tool name
    pub tool_name: String,
    /// Parent tool use, for subagent traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
    /// Seconds since the tool started
    #[serde(default)]
    pub elapsed_time_seconds: f64,
}

/// MCP authentication progress
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "auth_status")]
pub struct AuthStatusMessage {
    /// Unique id of this frame
    pub uuid: String,
    /// Owning session
    pub session_id: String,
    /// Whether authentication is still running
    #[serde(rename = "isAuthenticating")]
    pub is_authenticating: bool,
    /// Output lines from the auth flow
    #[serde(default)]
    pub output: Vec<String>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
