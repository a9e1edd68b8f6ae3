//! Runtime control methods
//!
//! Every method here is a correlated control request: it writes one
//! `control_request`, then waits for the matching `control_response`, the
//! caller's cancellation, or session shutdown, whichever comes first. Any
//! number of these may be in flight at once.

use crate::error::{Result, SessionError};
use crate::hooks::HookRegistry;
use crate::session::core::Session;
use claudewire_protocol::{
    AccountInfo, ControlRequestBody, DecodeErrorKind, McpServerStatus, ModelInfo,
    PermissionMode, ProtocolError, SlashCommand,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

impl Session {
    /// Handshake with the peer and register hook callbacks
    ///
    /// Returns the server info the peer answered with. Succeeds at most once
    /// per session; a failed attempt may be retried.
    #[tracing::instrument(skip_all, fields(session_id = %self.router.session_id))]
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<Value> {
        let (registry, advertised) = HookRegistry::assign(&self.hooks);
        let callbacks = registry.len();
        {
            let mut shared = self.router.shared();
            if shared.hooks.is_some() {
                return Err(SessionError::AlreadyInitialized);
            }
            shared.hooks = Some(registry);
        }

        let hooks = (!advertised.is_empty()).then_some(advertised);
        match self
            .router
            .request(cancel, ControlRequestBody::Initialize { hooks })
            .await
        {
            Ok(response) => {
                let server_info = response.unwrap_or(Value::Null);
                self.router.shared().server_info = Some(server_info.clone());
                info!(callbacks, "session initialized");
                Ok(server_info)
            }
            Err(err) => {
                self.router.shared().hooks = None;
                Err(err)
            }
        }
    }

    /// Server info stored by [`initialize`](Session::initialize)
    pub fn server_info(&self) -> Result<Value> {
        self.router
            .shared()
            .server_info
            .clone()
            .ok_or(SessionError::NotInitialized)
    }

    /// Stop the current turn
    pub async fn interrupt(&self, cancel: &CancellationToken) -> Result<()> {
        self.router
            .request(cancel, ControlRequestBody::Interrupt)
            .await
            .map(drop)
    }

    /// Change how tool use is authorised
    pub async fn set_permission_mode(
        &self,
        cancel: &CancellationToken,
        mode: PermissionMode,
    ) -> Result<()> {
        self.router
            .request(cancel, ControlRequestBody::SetPermissionMode { mode })
            .await
            .map(drop)
    }

    /// Switch model; `None` restores the default
    pub async fn set_model(&self, cancel: &CancellationToken, model: Option<String>) -> Result<()> {
        self.router
            .request(cancel, ControlRequestBody::SetModel { model })
            .await
            .map(drop)
    }

    /// Set the extended thinking budget; `None` clears it
    pub async fn set_max_thinking_tokens(
        &self,
        cancel: &CancellationToken,
        max_thinking_tokens: Option<u32>,
    ) -> Result<()> {
        self.router
            .request(
                cancel,
                ControlRequestBody::SetMaxThinkingTokens {
                    max_thinking_tokens,
                },
            )
            .await
            .map(drop)
    }

    /// Account details of the logged-in user
    pub async fn account_info(&self, cancel: &CancellationToken) -> Result<AccountInfo> {
        let response = self
            .router
            .request(cancel, ControlRequestBody::AccountInfo)
            .await?;
        Ok(response_field(response, "accountInfo", "data")?.unwrap_or_default())
    }

    /// Slash commands the peer supports
    pub async fn supported_commands(&self, cancel: &CancellationToken) -> Result<Vec<SlashCommand>> {
        let response = self
            .router
            .request(cancel, ControlRequestBody::SupportedCommands)
            .await?;
        Ok(response_field(response, "supportedCommands", "commands")?.unwrap_or_default())
    }

    /// Models the peer can switch to
    pub async fn supported_models(&self, cancel: &CancellationToken) -> Result<Vec<ModelInfo>> {
        let response = self
            .router
            .request(cancel, ControlRequestBody::SupportedModels)
            .await?;
        Ok(response_field(response, "supportedModels", "models")?.unwrap_or_default())
    }

    /// Connection status of each configured MCP server
    pub async fn mcp_server_status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<McpServerStatus>> {
        let response = self
            .router
            .request(cancel, ControlRequestBody::McpServerStatus)
            .await?;
        Ok(response_field(response, "mcpServerStatus", "servers")?.unwrap_or_default())
    }
}

/// Decode one field of a success payload; absent or null is `None`
fn response_field<T: DeserializeOwned>(
    response: Option<Value>,
    subtype: &str,
    field: &str,
) -> Result<Option<T>> {
    let value = match response {
        Some(Value::Object(mut payload)) => payload.remove(field),
        _ => None,
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(|err| {
            ProtocolError::from_json(DecodeErrorKind::InvalidPayload, err)
                .with_message_type("control_response")
                .with_subtype(subtype)
                .into()
        }),
    }
}
