//! Transport error types

use std::io;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport and process operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A frame grew past the configured limit before its terminator arrived
    #[error("buffer size exceeded: limit={limit} bytes, actual={actual} bytes, operation={operation}")]
    FrameTooLarge {
        /// Configured maximum, terminator included
        limit: usize,
        /// Bytes accumulated when the limit was crossed
        actual: usize,
        /// What was accumulating
        operation: &'static str,
    },

    /// Reading from the peer failed
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing to the peer failed
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Any other I/O failure, such as shutting a stream down
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame the transport refuses to write
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The transport was closed
    #[error("transport closed")]
    Closed,

    /// The child process could not be started
    #[error("failed to spawn `{executable}`: {source}")]
    Spawn {
        /// Executable that failed to start
        executable: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A standard stream was not piped
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),

    /// The kill signal could not be delivered
    #[error("failed to kill process: {0}")]
    Kill(#[source] io::Error),

    /// Waiting for the child failed
    #[error("failed to wait for process: {0}")]
    Wait(String),

    /// The executable failed its compatibility check
    #[error("version check failed: {0}")]
    VersionCheck(String),

    /// Other process supervision failure
    #[error("process error: {0}")]
    Process(String),
}

impl TransportError {
    /// Whether this error only reports cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error comes from process supervision rather than the byte stream
    pub fn is_process_error(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. }
                | Self::MissingPipe(_)
                | Self::Kill(_)
                | Self::Wait(_)
                | Self::VersionCheck(_)
                | Self::Process(_)
        )
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::Read(_) => "read_failed",
            Self::Write(_) => "write_failed",
            Self::Io(_) => "io_error",
            Self::InvalidFrame(_) => "invalid_frame",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
            Self::Spawn { .. } => "spawn_failed",
            Self::MissingPipe(_) => "pipe_failed",
            Self::Kill(_) => "kill_failed",
            Self::Wait(_) => "wait_failed",
            Self::VersionCheck(_) => "version_check_failed",
            Self::Process(_) => "process_failed",
        }
    }
}
