//! Error types for the session engine
//!
//! Every error has a stable `category()` and `code()`. When the receive loop
//! fails, the pair is rendered as `"<category>/<code>: <message>"` into the
//! error result delivered on the message stream.

use claudewire_protocol::ProtocolError;
use claudewire_transport::TransportError;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur in session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport or process failure
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// Frame could not be decoded or encoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A permission or hook callback failed or is missing
    #[error("callback `{callback}` failed: {reason}")]
    Callback {
        /// Which callback
        callback: String,
        /// What went wrong
        reason: String,
    },

    /// The peer answered a control request with an error
    #[error("control request `{subtype}` failed: {message}")]
    ControlRequestFailed {
        /// Request subtype
        subtype: String,
        /// Error reported by the peer
        message: String,
    },

    /// `initialize` has not completed
    #[error("session not initialized")]
    NotInitialized,

    /// `initialize` already completed
    #[error("session already initialized")]
    AlreadyInitialized,

    /// The session is closing or closed
    #[error("session closed")]
    Closed,

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

impl SessionError {
    /// Create a callback error
    pub fn callback(callback: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Callback {
            callback: callback.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only reports cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Transport(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Broad error class: client, transport, protocol, callback or process
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(e) if e.is_process_error() => "process",
            Self::Transport(_) => "transport",
            Self::Protocol(_) | Self::ControlRequestFailed { .. } => "protocol",
            Self::Callback { .. } => "callback",
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::Closed
            | Self::Cancelled
            | Self::Config(_) => "client",
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Protocol(e) => e.code(),
            Self::Callback { .. } => "callback_failed",
            Self::ControlRequestFailed { .. } => "control_request_failed",
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::Closed => "session_closed",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "invalid_config",
        }
    }

    /// `"<category>/<code>: <message>"`, as carried by error results
    pub fn to_stream_error(&self) -> String {
        format!("{}/{}: {}", self.category(), self.code(), self)
    }
}
