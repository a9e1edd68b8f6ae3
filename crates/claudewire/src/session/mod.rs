//! Sessions with the Claude Code CLI
//!
//! # Module Organization
//!
//! - [`state`] - Lifecycle state
//! - [`core`] - The `Session` struct, construction and close
//! - [`query`] - User turns and message streaming
//! - [`control`] - Initialize and the runtime control requests
//!
//! # Examples
//!
//! ```no_run
//! # use claudewire::{Session, SessionConfig};
//! # use tokio_util::sync::CancellationToken;
//! # async fn example() -> claudewire::Result<()> {
//! let session = Session::spawn(SessionConfig::default()).await?;
//! let cancel = CancellationToken::new();
//!
//! session.initialize(&cancel).await?;
//! session.send_user_message(&cancel, "What is 2+2?").await?;
//!
//! while let Some(message) = session.next_message(&cancel).await? {
//!     if message.is_result() {
//!         break;
//!     }
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod control;
pub mod core;
pub mod query;
pub mod state;

pub use self::core::Session;
pub use self::state::SessionState;
