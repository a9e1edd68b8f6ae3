//! Common types shared by messages and control traffic

use serde::{Deserialize, Serialize};

/// Token usage information
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Usage {
    /// Number of tokens in the input
    #[serde(default)]
    pub input_tokens: u64,

    /// Number of tokens in the output
    #[serde(default)]
    pub output_tokens: u64,

    /// Tokens read from the prompt cache
    #[serde(default)]
    pub cache_read_input_tokens: u64,

    /// Tokens written to the prompt cache
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl Usage {
    /// Create a new usage structure
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    /// Get total tokens (input + output)
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Per-model usage reported on result messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u64,
    /// Tokens read from the prompt cache
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    /// Tokens written to the prompt cache
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Web search requests issued
    #[serde(default)]
    pub web_search_requests: u64,
    /// Cost in USD
    #[serde(default, rename = "costUSD")]
    pub cost_usd: f64,
    /// Context window size of the model
    #[serde(default)]
    pub context_window: u64,
}

/// Permission mode for tool use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask for permission for each tool use
    #[default]
    Default,

    /// Automatically accept edits without asking
    AcceptEdits,

    /// Bypass permission checks entirely
    BypassPermissions,

    /// Plan only, do not execute tools
    Plan,
}

impl PermissionMode {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }
}

/// Account details returned by the `accountInfo` control request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Account email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Organization name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Subscription tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
    /// Where the auth token came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_source: Option<String>,
    /// Where the API key came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_source: Option<String>,
}

/// A slash command the peer supports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlashCommand {
    /// Command name without the leading slash
    pub name: String,
    /// What the command does
    #[serde(default)]
    pub description: String,
    /// Hint describing the command arguments
    #[serde(default)]
    pub argument_hint: String,
}

/// A model the peer can switch to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier used by `setModel`
    pub value: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
}

/// Connection status of an MCP server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct McpServerStatus {
    /// Server name
    pub name: String,
    /// "connected", "failed", "needs-auth" or "pending"
    pub status: String,
    /// Server-reported identity, once connected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<McpServerInfo>,
}

/// Identity reported by an MCP server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerInfo {
    /// Server name
    pub name: String,
    /// Server version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_mode_wire_names() {
        assert_eq!(
            serde_json::to_value(PermissionMode::AcceptEdits).unwrap(),
            json!("acceptEdits")
        );
        assert_eq!(
            serde_json::to_value(PermissionMode::BypassPermissions).unwrap(),
            json!(PermissionMode::BypassPermissions.as_str())
        );
        assert_eq!(
            serde_json::from_value::<PermissionMode>(json!("plan")).unwrap(),
            PermissionMode::Plan
        );
    }

    #[test]
    fn test_model_usage_camel_case() {
        let usage = ModelUsage {
            web_search_requests: 2,
            cost_usd: 0.0015,
            ..ModelUsage::default()
        };
        let json = serde_json::to_value(usage).unwrap();
        assert_eq!(json["webSearchRequests"], 2);
        assert_eq!(json["costUSD"], 0.0015);
    }

    #[test]
    fn test_usage_defaults_missing_fields() {
        let usage: Usage = serde_json::from_value(json!({"input_tokens": 3})).unwrap();
        assert_eq!(usage, Usage::new(3, 0));
        assert_eq!(usage.total_tokens(), 3);
    }
}
