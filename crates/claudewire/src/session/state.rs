//! Session lifecycle state

use std::fmt;

/// Lifecycle of a session
///
/// Moves forward only: `Starting -> Running -> Closing -> Closed`.
/// `Running` is skipped when a session closes before its first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, nothing written yet
    Starting,

    /// At least one frame written
    Running,

    /// `close` has begun
    Closing,

    /// Transport closed and all tasks stopped
    Closed,
}

impl SessionState {
    /// Whether `close` has begun
    pub fn is_closing(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
