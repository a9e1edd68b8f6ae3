//! Core session management
//!
//! Construction, state inspection and the close sequence.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::hooks::HookMatcher;
use crate::routing::{self, Router};
use crate::session::state::SessionState;
use claudewire_protocol::{HookEvent, Message};
use claudewire_transport::{CliTransport, Transport};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::info;
use uuid::Uuid;

/// A live conversation with the CLI
///
/// Owns the receive loop and the correlation table. Messages arrive in wire
/// order through [`next_message`](Session::next_message) or
/// [`messages`](Session::messages); control operations may run concurrently
/// with each other and with message consumption.
pub struct Session {
    /// Routing state shared with the receive loop and dispatch tasks
    pub(crate) router: Arc<Router>,

    /// Ordered output queue
    pub(crate) queue: Mutex<mpsc::Receiver<Message>>,

    /// Hook configuration, registered by `initialize`
    pub(crate) hooks: HashMap<HookEvent, Vec<HookMatcher>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.router.session_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Spawn the CLI described by `config.process` and start a session on it
    ///
    /// Spawn failures, including a failed version check, are returned here.
    #[tracing::instrument(skip_all, fields(cli_path = %config.process.cli_path.display()))]
    pub async fn spawn(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let transport = CliTransport::spawn(config.process.clone()).await?;
        Ok(Self::start(Arc::new(transport), config))
    }

    /// Start a session over an existing transport
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_transport(transport: Arc<dyn Transport>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::start(transport, config))
    }

    fn start(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let router = Arc::new(Router::new(transport, session_id, config.can_use_tool));
        let (tx, rx) = mpsc::channel(config.message_buffer);

        tokio::spawn(routing::receive_loop(Arc::clone(&router), tx));
        info!(session_id = %router.session_id, "session started");

        Self {
            router,
            queue: Mutex::new(rx),
            hooks: config.hooks,
        }
    }

    /// Identifier sent with every outbound frame
    pub fn session_id(&self) -> &str {
        &self.router.session_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.router.state.borrow()
    }

    /// Whether `close` has begun
    pub fn is_closed(&self) -> bool {
        self.state().is_closing()
    }

    /// Close the session
    ///
    /// Cancels every in-flight operation, stops the receive loop and closes
    /// the transport. Safe to call any number of times and from several
    /// tasks at once; only the first call does the work, later calls wait
    /// for it to finish. Messages already queued can still be read.
    #[tracing::instrument(skip(self), fields(session_id = %self.router.session_id))]
    pub async fn close(&self) -> Result<()> {
        self.router.shutdown().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Background tasks release the transport once they observe this.
        self.router.cancel.cancel();
    }
}
