//! Tool permission callback
//!
//! The peer asks before running a tool by sending `can_use_tool`. The
//! configured [`CanUseTool`] callback decides, and its
//! [`PermissionResult`](claudewire_protocol::PermissionResult) becomes the
//! success response.

use crate::error::Result;
use claudewire_protocol::{CanUseToolRequest, PermissionResult};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Async permission callback: `(tool_name, input, context)`
pub type CanUseTool = Arc<
    dyn Fn(
            String,
            Value,
            ToolPermissionContext,
        ) -> Pin<Box<dyn Future<Output = Result<PermissionResult>> + Send>>
        + Send
        + Sync,
>;

/// Context accompanying a permission request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolPermissionContext {
    /// Permission updates the peer suggests
    pub suggestions: Vec<Value>,

    /// Path that triggered the check
    pub blocked_path: Option<String>,

    /// Tool use being checked
    pub tool_use_id: Option<String>,

    /// Subagent making the call
    pub agent_id: Option<String>,

    /// Why the peer is asking
    pub decision_reason: Option<String>,
}

impl ToolPermissionContext {
    /// Split a wire request into tool name, input and context
    pub(crate) fn from_request(request: CanUseToolRequest) -> (String, Value, Self) {
        let context = Self {
            suggestions: request.permission_suggestions,
            blocked_path: request.blocked_path,
            tool_use_id: request.tool_use_id,
            agent_id: request.agent_id,
            decision_reason: request.decision_reason,
        };
        (request.tool_name, request.input, context)
    }
}

/// Wrap an async closure as a [`CanUseTool`] callback
pub fn can_use_tool<F, Fut>(callback: F) -> CanUseTool
where
    F: Fn(String, Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
{
    Arc::new(move |tool, input, context| {
        Box::pin(callback(tool, input, context))
            as Pin<Box<dyn Future<Output = Result<PermissionResult>> + Send>>
    })
}
