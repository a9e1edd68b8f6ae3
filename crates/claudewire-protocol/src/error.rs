//! Error types for protocol operations
//!
//! Decode errors carry whatever envelope context was known when decoding
//! failed (message type, subtype, request id, session id) so a misbehaving
//! peer can be diagnosed from the error alone.

use std::fmt;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Classification of a decode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// The frame is not a JSON object or lacks its discriminator.
    InvalidEnvelope,

    /// The envelope `type` is not one this codec knows.
    UnknownMessageType,

    /// The control `subtype` is not one this codec knows.
    UnknownSubtype,

    /// The discriminator was recognised but the body did not match its shape.
    InvalidPayload,
}

impl DecodeErrorKind {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEnvelope => "message_parse_failed",
            Self::UnknownMessageType => "unknown_message_type",
            Self::UnknownSubtype => "unknown_subtype",
            Self::InvalidPayload => "invalid_message",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Envelope context attached to decode errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeContext {
    /// Envelope `type`, when known.
    pub message_type: Option<String>,
    /// Control or system `subtype`, when known.
    pub subtype: Option<String>,
    /// Control `request_id`, when known.
    pub request_id: Option<String>,
    /// Envelope `session_id`, when known.
    pub session_id: Option<String>,
}

impl DecodeContext {
    fn is_empty(&self) -> bool {
        self.message_type.is_none()
            && self.subtype.is_none()
            && self.request_id.is_none()
            && self.session_id.is_none()
    }
}

impl fmt::Display for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let fields = [
            ("message_type", &self.message_type),
            ("subtype", &self.subtype),
            ("request_id", &self.request_id),
            ("session_id", &self.session_id),
        ];
        let mut first = true;
        f.write_str(" (")?;
        for (name, value) in fields {
            if let Some(value) = value {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{name}={value}")?;
                first = false;
            }
        }
        f.write_str(")")
    }
}

/// Errors that can occur during protocol operations
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame could not be decoded
    #[error("{kind}: {detail}{context}")]
    Decode {
        /// What went wrong.
        kind: DecodeErrorKind,
        /// Human-readable detail.
        detail: String,
        /// Envelope fields known at the point of failure.
        context: DecodeContext,
        /// Underlying JSON error, if any.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A value could not be encoded
    #[error("failed to encode {message_type}: {source}")]
    Encode {
        /// The kind of value being encoded.
        message_type: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Tool result content had both shapes or neither
    #[error("invalid tool result content: {0}")]
    InvalidToolResultContent(&'static str),
}

impl ProtocolError {
    /// Create a decode error with no context yet
    pub fn decode(kind: DecodeErrorKind, detail: impl Into<String>) -> Self {
        Self::Decode {
            kind,
            detail: detail.into(),
            context: DecodeContext::default(),
            source: None,
        }
    }

    /// Create a decode error from a JSON failure
    pub fn from_json(kind: DecodeErrorKind, err: serde_json::Error) -> Self {
        Self::Decode {
            kind,
            detail: err.to_string(),
            context: DecodeContext::default(),
            source: Some(err),
        }
    }

    /// Attach the envelope type
    pub fn with_message_type(self, message_type: impl Into<String>) -> Self {
        self.map_context(|ctx| ctx.message_type = Some(message_type.into()))
    }

    /// Attach the subtype
    pub fn with_subtype(self, subtype: impl Into<String>) -> Self {
        self.map_context(|ctx| ctx.subtype = Some(subtype.into()))
    }

    /// Attach the request id
    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        self.map_context(|ctx| ctx.request_id = Some(request_id.into()))
    }

    /// Attach the session id
    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        self.map_context(|ctx| ctx.session_id = Some(session_id.into()))
    }

    fn map_context(mut self, f: impl FnOnce(&mut DecodeContext)) -> Self {
        if let Self::Decode { context, .. } = &mut self {
            f(context);
        }
        self
    }

    /// Decode classification, if this is a decode error
    pub fn kind(&self) -> Option<DecodeErrorKind> {
        match self {
            Self::Decode { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Decode context, if this is a decode error
    pub fn context(&self) -> Option<&DecodeContext> {
        match self {
            Self::Decode { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Request id of a peer control request whose body failed to decode
    ///
    /// Such a request can still be answered with an error response.
    pub fn unanswered_request_id(&self) -> Option<&str> {
        match self {
            Self::Decode {
                kind: DecodeErrorKind::InvalidPayload,
                context,
                ..
            } if context.message_type.as_deref() == Some("control_request") => {
                context.request_id.as_deref()
            }
            _ => None,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode { kind, .. } => kind.code(),
            Self::Encode { .. } => "encode_failed",
            Self::InvalidToolResultContent(_) => "invalid_tool_result_content",
        }
    }
}
