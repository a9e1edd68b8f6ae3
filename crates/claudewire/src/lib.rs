//! Session engine for the Claude Code CLI
//!
//! Drives the CLI as a child process speaking line-delimited JSON over its
//! standard streams: one JSON object per line in each direction.
//!
//! # Key Features
//!
//! - **Ordered message stream**: assistant, system, stream and result
//!   messages arrive in wire order through a bounded queue
//! - **Correlated control requests**: interrupt, model and permission-mode
//!   changes and the info queries may be issued concurrently; each response is
//!   routed back to its caller by request id
//! - **Inbound dispatch**: permission checks and hook callbacks from the CLI
//!   are answered by the callbacks in [`SessionConfig`], each on its own task
//! - **Clean shutdown**: [`Session::close`] is idempotent and unblocks every
//!   pending operation
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`claudewire-protocol`): wire types and the codec
//! 2. **Transport Layer** (`claudewire-transport`): framing and the process
//!    supervisor
//! 3. **Session Layer** (this crate): correlation, dispatch and the public API
//!
//! # Usage Example
//!
//! ```no_run
//! use claudewire::{ProcessConfig, SessionConfig, simple_query};
//! use futures::StreamExt;
//!
//! # async fn example() {
//! let config = SessionConfig::new(
//!     ProcessConfig::new("claude").with_args(["--output-format", "stream-json"]),
//! );
//! let mut messages = Box::pin(simple_query("What is 2+2?", config));
//! while let Some(message) = messages.next().await {
//!     println!("{}", message.type_name());
//! }
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hooks;
pub mod permissions;
pub(crate) mod routing;
pub mod session;
pub mod simple;
pub mod testing;

pub use config::{DEFAULT_MESSAGE_BUFFER, SessionConfig};
pub use error::{Result, SessionError};
pub use hooks::{HookCallback, HookMatcher};
pub use permissions::{CanUseTool, ToolPermissionContext, can_use_tool};
pub use session::{Session, SessionState};
pub use simple::{query_session, simple_query};

pub use claudewire_transport::{ProcessConfig, Transport};

pub use claudewire_protocol::{
    ContentBlock, HookEvent, HookOutput, Message, PermissionMode, PermissionResult,
};
