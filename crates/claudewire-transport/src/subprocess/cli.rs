//! CLI transport implementation
//!
//! Bundles the framed stdin/stdout transport with the supervising process
//! handle, so closing the transport also reaps the child.

use super::process::{ProcessConfig, ProcessHandle};
use crate::error::Result;
use crate::framed::FramedTransport;
use crate::traits::Transport;
use async_trait::async_trait;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// CLI transport for Claude Code communication
///
/// Spawns and manages the Claude Code CLI process with bidirectional
/// JSON message passing.
#[derive(Debug)]
pub struct CliTransport {
    transport: Arc<FramedTransport>,
    process: ProcessHandle,
}

impl CliTransport {
    /// Create a new CLI transport by spawning the Claude CLI process
    pub async fn spawn(config: ProcessConfig) -> Result<Self> {
        let (transport, process) = ProcessHandle::spawn(config).await?;
        Ok(Self { transport, process })
    }

    /// The supervising process handle
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    /// The underlying framed transport
    pub fn framed(&self) -> &Arc<FramedTransport> {
        &self.transport
    }

    /// Wait for the child to exit
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<ExitStatus> {
        self.process.wait(cancel).await
    }
}

#[async_trait]
impl Transport for CliTransport {
    async fn read_frame(&self, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        self.transport.read(cancel).await
    }

    async fn write_frame(&self, cancel: &CancellationToken, frame: &[u8]) -> Result<()> {
        self.transport.write(cancel, frame).await
    }

    /// Close the pipes, kill the child, then wait for the exit observer
    ///
    /// Every step runs even if an earlier one failed; the first failure is
    /// returned. A child that already exited is not an error.
    async fn close(&self) -> Result<()> {
        let closed = self.transport.close().await;
        debug!(ok = closed.is_ok(), "closed CLI pipes");

        let killed = self.process.kill().await;
        debug!(ok = killed.is_ok(), "killed CLI process");

        let waited = self.process.wait(&CancellationToken::new()).await;
        debug!(status = ?waited.as_ref().ok(), "CLI process reaped");

        closed.and(killed).and(waited.map(|_| ()))
    }
}
