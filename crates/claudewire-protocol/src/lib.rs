//! Wire types for driving a Claude Code CLI session over line-delimited JSON
//!
//! This crate is pure data: every type here serializes to exactly the JSON
//! object the peer reads or writes, and [`codec`] turns single frames into
//! typed values and back. No I/O happens here.
//!
//! # Type Organization
//!
//! - **Messages**: [`message`] - user, assistant, system, stream and result envelopes
//! - **Content**: [`content`] - text, images, tool use/results, thinking
//! - **Streaming**: [`stream`] - raw API streaming events and deltas
//! - **Control**: [`control`] - control requests and responses in both directions
//! - **Hooks and permissions**: [`hooks`], [`permissions`]
//! - **Codec**: [`codec`] - frame decode/encode with contextual errors
//!
//! # Usage
//!
//! ```
//! use claudewire_protocol::codec::{decode_frame, Inbound};
//!
//! let frame = br#"{"type":"control_response","response":{"subtype":"success","request_id":"req_1_ab12cd34"}}"#;
//! let Inbound::ControlResponse(resp) = decode_frame(frame).unwrap() else {
//!     panic!("expected a control response");
//! };
//! assert_eq!(resp.request_id(), "req_1_ab12cd34");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod content;
pub mod control;
pub mod error;
pub mod hooks;
pub mod message;
pub mod permissions;
pub mod stream;
pub mod types;

pub use codec::{Inbound, Outbound, decode_frame, decode_outbound, encode};
pub use content::{ContentBlock, ToolResultContent};
pub use control::{
    CanUseToolRequest, ControlRequest, ControlRequestBody, ControlResponse, ControlResponseBody,
    HookCallbackRequest, PeerRequest,
};
pub use error::{DecodeErrorKind, ProtocolError, Result};
pub use hooks::{HookEvent, HookMatcherConfig, HookOutput};
pub use message::{
    AssistantMessage, Message, ResultMessage, StreamEvent, SystemMessage, UserMessage,
};
pub use permissions::PermissionResult;
pub use stream::{ContentDelta, StreamEventPayload};
pub use types::{
    AccountInfo, McpServerInfo, McpServerStatus, ModelInfo, PermissionMode, SlashCommand, Usage,
};
