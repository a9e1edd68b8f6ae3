//! Content block types
//!
//! Content blocks are a tagged union keyed by `type`. Decoding peeks the tag
//! first and only then decodes the variant body, so an unknown tag is reported
//! by name instead of as a generic shape mismatch.

use crate::error::ProtocolError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A content block in a user or assistant message
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text(TextBlock),

    /// Image content.
    Image(ImageBlock),

    /// A request from the model to use a tool.
    ToolUse(ToolUseBlock),

    /// The result of a tool execution.
    ToolResult(ToolResultBlock),

    /// Extended thinking output.
    Thinking(ThinkingBlock),
}

/// Body of a `text` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBlock {
    /// The text content.
    pub text: String,
}

/// Body of an `image` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageBlock {
    /// Where the image bytes come from.
    pub source: ImageSource,
}

/// Image source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// A base64-encoded image.
    Base64 {
        /// The media type of the image (e.g., "image/png").
        media_type: String,
        /// The base64-encoded image data.
        data: String,
    },

    /// An image referenced by a URL.
    Url {
        /// The URL of the image.
        url: String,
    },
}

/// Body of a `tool_use` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolUseBlock {
    /// The unique identifier for this tool use request.
    pub id: String,
    /// The name of the tool to be used.
    pub name: String,
    /// The input to the tool, as a JSON object.
    #[serde(default)]
    pub input: Value,
}

/// Body of a `tool_result` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultBlock {
    /// The `id` of the `tool_use` block this result answers.
    pub tool_use_id: String,

    /// The tool's output, either plain text or nested blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ToolResultContent>,

    /// Whether the tool execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Body of a `thinking` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThinkingBlock {
    /// The model's reasoning text.
    pub thinking: String,

    /// Integrity signature attached by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Content of a tool result: plain text or a list of nested blocks
///
/// Exactly one shape is present. On the wire the text form is a JSON string and
/// the block form is a JSON array.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultContent {
    /// Plain text output.
    Text(String),

    /// Structured output made of nested content blocks.
    Blocks(Vec<ContentBlock>),
}

impl ToolResultContent {
    /// Build tool result content from two loosely typed halves.
    ///
    /// Fails when both halves or neither half is present. An empty block
    /// list counts as absent.
    pub fn from_parts(
        text: Option<String>,
        blocks: Option<Vec<ContentBlock>>,
    ) -> Result<Self, ProtocolError> {
        match (text, blocks.filter(|blocks| !blocks.is_empty())) {
            (Some(text), None) => Ok(Self::Text(text)),
            (None, Some(blocks)) => Ok(Self::Blocks(blocks)),
            (Some(_), Some(_)) => Err(ProtocolError::InvalidToolResultContent(
                "text and blocks are mutually exclusive",
            )),
            (None, None) => Err(ProtocolError::InvalidToolResultContent(
                "one of text or blocks is required",
            )),
        }
    }

    /// Text form, if this is plain text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Blocks(_) => None,
        }
    }

    /// Block form, if this is structured output
    pub fn as_blocks(&self) -> Option<&[ContentBlock]> {
        match self {
            Self::Text(_) => None,
            Self::Blocks(blocks) => Some(blocks),
        }
    }
}

impl Serialize for ToolResultContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Blocks(blocks) => blocks.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ToolResultContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<ContentBlock>, _>>()
                .map(Self::Blocks)
                .map_err(|e| D::Error::custom(format_args!("invalid tool result blocks: {e}"))),
            other => Err(D::Error::custom(format_args!(
                "tool result content must be a string or an array of blocks, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let tag = crate::codec::peek_str(&value, "type")
            .ok_or_else(|| D::Error::custom("content block is missing `type`"))?
            .to_owned();

        let block = match tag.as_str() {
            "text" => serde_json::from_value(value).map(Self::Text),
            "image" => serde_json::from_value(value).map(Self::Image),
            "tool_use" => serde_json::from_value(value).map(Self::ToolUse),
            "tool_result" => serde_json::from_value(value).map(Self::ToolResult),
            "thinking" => serde_json::from_value(value).map(Self::Thinking),
            other => {
                return Err(D::Error::custom(format_args!(
                    "unknown content block type `{other}`"
                )));
            }
        };
        block.map_err(|e| D::Error::custom(format_args!("invalid `{tag}` block: {e}")))
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ContentBlock {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextBlock { text: text.into() })
    }

    /// Create a tool use content block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse(ToolUseBlock {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    /// Create a tool result content block carrying plain text
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult(ToolResultBlock {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(content.into())),
            is_error: None,
        })
    }

    /// Create an error tool result
    pub fn tool_error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolResult(ToolResultBlock {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(error.into())),
            is_error: Some(true),
        })
    }

    /// Create a thinking content block
    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking(ThinkingBlock {
            thinking: thinking.into(),
            signature: None,
        })
    }

    /// Create a base64 image block
    pub fn image_base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Image(ImageBlock {
            source: ImageSource::Base64 {
                media_type: media_type.into(),
                data: data.into(),
            },
        })
    }

    /// Wire tag of this block
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::ToolUse(_) => "tool_use",
            Self::ToolResult(_) => "tool_result",
            Self::Thinking(_) => "thinking",
        }
    }

    /// Extract text if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(block) => Some(&block.text),
            _ => None,
        }
    }

    /// Extract the tool use body if this is a tool use block
    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            Self::ToolUse(block) => Some(block),
            _ => None,
        }
    }
}
