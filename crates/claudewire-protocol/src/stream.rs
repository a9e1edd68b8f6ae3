//! Streaming event payloads carried by `stream_event` messages
//!
//! The payload is itself a tagged union keyed by `type`, and content deltas
//! are one level deeper still. Both are decoded by peeking the tag first.

use crate::codec::{peek_str, take_field};
use crate::content::ContentBlock;
use crate::message::AssistantPayload;
use crate::types::Usage;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A raw API streaming event
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventPayload {
    /// A new assistant message begins.
    MessageStart {
        /// Message skeleton, usually with empty content.
        message: AssistantPayload,
    },

    /// A content block begins.
    ContentBlockStart {
        /// Block position in the message.
        index: u32,
        /// Initial block state.
        content_block: ContentBlock,
    },

    /// Incremental content for an open block.
    ContentBlockDelta {
        /// Block position in the message.
        index: u32,
        /// The increment.
        delta: ContentDelta,
    },

    /// A content block is complete.
    ContentBlockStop {
        /// Block position in the message.
        index: u32,
    },

    /// Message-level changes such as the stop reason.
    MessageDelta {
        /// Changed message fields.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta: Option<MessageDeltaBody>,
        /// Cumulative usage.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },

    /// The message is complete.
    MessageStop,
}

/// Fields changed by a `message_delta` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageDeltaBody {
    /// Why generation stopped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Stop sequence that ended generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
}

/// Incremental content for a block
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Appended text.
    TextDelta {
        /// Text fragment.
        text: String,
    },

    /// Appended fragment of a tool input JSON document.
    InputJsonDelta {
        /// JSON fragment, not valid on its own.
        partial_json: String,
    },

    /// Appended thinking text.
    ThinkingDelta {
        /// Thinking fragment.
        thinking: String,
    },

    /// Signature for a thinking block.
    SignatureDelta {
        /// Signature value.
        signature: String,
    },
}

impl ContentDelta {
    /// Text carried by text-like deltas
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextDelta { text } => Some(text),
            Self::InputJsonDelta { partial_json } => Some(partial_json),
            Self::ThinkingDelta { thinking } => Some(thinking),
            Self::SignatureDelta { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for ContentDelta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

impl ContentDelta {
    fn from_value(mut value: Value) -> Result<Self, String> {
        let tag = peek_str(&value, "type")
            .ok_or("content delta is missing `type`")?
            .to_owned();

        Ok(match tag.as_str() {
            "text_delta" => Self::TextDelta {
                text: take_field(&mut value, "text")?,
            },
            "input_json_delta" => Self::InputJsonDelta {
                partial_json: take_field(&mut value, "partial_json")?,
            },
            "thinking_delta" => Self::ThinkingDelta {
                thinking: take_field(&mut value, "thinking")?,
            },
            "signature_delta" => Self::SignatureDelta {
                signature: take_field(&mut value, "signature")?,
            },
            other => return Err(format!("unknown content delta type `{other}`")),
        })
    }
}

impl<'de> Deserialize<'de> for StreamEventPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}

fn take_optional<T: serde::de::DeserializeOwned>(
    value: &mut Value,
    field: &str,
) -> Result<Option<T>, String> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => take_field(value, field).map(Some),
    }
}

impl StreamEventPayload {
    fn from_value(mut value: Value) -> Result<Self, String> {
        let tag = peek_str(&value, "type")
            .ok_or("stream event is missing `type`")?
            .to_owned();

        Ok(match tag.as_str() {
            "message_start" => Self::MessageStart {
                message: take_field(&mut value, "message")?,
            },
            "content_block_start" => Self::ContentBlockStart {
                index: take_field(&mut value, "index")?,
                content_block: take_field(&mut value, "content_block")?,
            },
            "content_block_delta" => Self::ContentBlockDelta {
                index: take_field(&mut value, "index")?,
                delta: take_field(&mut value, "delta")?,
            },
            "content_block_stop" => Self::ContentBlockStop {
                index: take_field(&mut value, "index")?,
            },
            "message_delta" => Self::MessageDelta {
                delta: take_optional(&mut value, "delta")?,
                usage: take_optional(&mut value, "usage")?,
            },
            "message_stop" => Self::MessageStop,
            other => return Err(format!("unknown stream event type `{other}`")),
        })
    }

    /// Wire `type` of this event
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
        }
    }
}
