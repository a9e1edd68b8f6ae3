//! Transport trait
//!
//! The session engine talks to its peer only through [`Transport`], so the
//! same engine runs over a child process, an in-memory pipe, or a scripted
//! test double.

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A bidirectional stream of newline-delimited frames
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read the next frame, or `None` at end of stream
    ///
    /// The returned bytes may still carry the trailing newline.
    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Option<Vec<u8>>>;

    /// Write one frame; the transport appends the terminator
    async fn write_frame(&self, cancel: &CancellationToken, frame: &[u8]) -> Result<()>;

    /// Release the underlying streams. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;
}
