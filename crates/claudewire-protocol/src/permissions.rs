//! Permission decisions for `can_use_tool` requests

use serde_json::{Map, Value, json};

/// Decision returned by a tool-permission callback
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionResult {
    /// Let the tool run, optionally with rewritten input.
    Allow {
        /// Replacement for the tool input.
        updated_input: Option<Value>,
    },

    /// Refuse the tool call.
    Deny {
        /// Explanation passed back to the model.
        message: String,
    },
}

impl PermissionResult {
    /// Allow with the original input
    pub fn allow() -> Self {
        Self::Allow {
            updated_input: None,
        }
    }

    /// Allow with a replacement input
    pub fn allow_with_input(input: Value) -> Self {
        Self::Allow {
            updated_input: Some(input),
        }
    }

    /// Deny with a message
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny {
            message: message.into(),
        }
    }

    /// Whether this decision allows the tool
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Body of the success control response for this decision
    pub fn to_response(&self) -> Value {
        match self {
            Self::Allow { updated_input } => {
                let mut body = Map::new();
                body.insert("allow".into(), Value::Bool(true));
                if let Some(input) = updated_input {
                    body.insert("input".into(), input.clone());
                }
                Value::Object(body)
            }
            Self::Deny { message } => json!({"allow": false, "reason": message}),
        }
    }
}
