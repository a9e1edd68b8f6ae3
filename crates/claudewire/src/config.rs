//! Session configuration

use crate::error::{Result, SessionError};
use crate::hooks::HookMatcher;
use crate::permissions::{CanUseTool, ToolPermissionContext, can_use_tool};
use claudewire_protocol::{HookEvent, PermissionResult};
use claudewire_transport::ProcessConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Default capacity of the ordered message queue
pub const DEFAULT_MESSAGE_BUFFER: usize = 100;

/// Configuration for a session
///
/// Controls how the engine spawns the CLI, how much unread output it holds,
/// and which callbacks answer the peer's control requests.
#[derive(Clone)]
pub struct SessionConfig {
    /// How to spawn the CLI; ignored by [`Session::with_transport`](crate::Session::with_transport)
    pub process: ProcessConfig,

    /// Capacity of the message queue; a full queue pauses the receive loop
    pub message_buffer: usize,

    /// Answers `can_use_tool` requests
    pub can_use_tool: Option<CanUseTool>,

    /// Hook callbacks registered during `initialize`
    pub hooks: HashMap<HookEvent, Vec<HookMatcher>>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            process: ProcessConfig::default(),
            message_buffer: DEFAULT_MESSAGE_BUFFER,
            can_use_tool: None,
            hooks: HashMap::new(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("process", &self.process)
            .field("message_buffer", &self.message_buffer)
            .field("can_use_tool", &self.can_use_tool.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl SessionConfig {
    /// Create a configuration that spawns `process`
    pub fn new(process: ProcessConfig) -> Self {
        Self {
            process,
            ..Self::default()
        }
    }

    /// Set the process configuration
    pub fn with_process(mut self, process: ProcessConfig) -> Self {
        self.process = process;
        self
    }

    /// Set the message queue capacity
    pub fn with_message_buffer(mut self, capacity: usize) -> Self {
        self.message_buffer = capacity;
        self
    }

    /// Set the permission callback
    pub fn with_can_use_tool<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(String, Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
    {
        self.can_use_tool = Some(can_use_tool(callback));
        self
    }

    /// Add a hook matcher for an event
    pub fn with_hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.hooks.entry(event).or_default().push(matcher);
        self
    }

    /// Check the configuration before starting a session
    pub fn validate(&self) -> Result<()> {
        if self.message_buffer == 0 {
            return Err(SessionError::Config(
                "message_buffer must be at least 1".to_string(),
            ));
        }
        if self.process.cli_path.as_os_str().is_empty() {
            return Err(SessionError::Config("cli_path must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudewire_protocol::HookOutput;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.message_buffer, 100);
        assert!(config.can_use_tool.is_none());
        assert!(config.hooks.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = SessionConfig::new(ProcessConfig::new("/opt/claude").with_arg("--verbose"))
            .with_message_buffer(8)
            .with_can_use_tool(|_, _, _| async { Ok(PermissionResult::allow()) })
            .with_hook(
                HookEvent::Stop,
                HookMatcher::any().with_callback(|_, _| async { Ok(HookOutput::default()) }),
            )
            .with_hook(HookEvent::Stop, HookMatcher::for_tool("Bash"));

        assert_eq!(config.message_buffer, 8);
        assert!(config.can_use_tool.is_some());
        assert_eq!(config.hooks[&HookEvent::Stop].len(), 2);
        assert_eq!(config.process.args, vec!["--verbose"]);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = SessionConfig::default()
            .with_message_buffer(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
