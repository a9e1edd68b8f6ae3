//! Line-framed transports for the Claude Code CLI
//!
//! Provides the [`Transport`] seam the session engine talks through, a
//! newline-delimited [`FramedTransport`] over any pair of async streams, and
//! a subprocess supervisor that wires a child's pipes into one.
//!
//! # Architecture
//!
//! - **Transport trait**: read/write/close of whole frames, each cancellable
//! - **Framed transport**: bounded line accumulation, independent read and write locks
//! - **Subprocess**: spawn, stderr pump, single-fire exit observer, kill/wait
//!
//! # Usage
//!
//! ```no_run
//! use claudewire_transport::{CliTransport, ProcessConfig, Transport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> claudewire_transport::Result<()> {
//! let config = ProcessConfig::new("claude")
//!     .with_args(["--output-format", "stream-json", "--input-format", "stream-json"]);
//! let transport = CliTransport::spawn(config).await?;
//! let cancel = CancellationToken::new();
//! while let Some(frame) = transport.read_frame(&cancel).await? {
//!     println!("{}", String::from_utf8_lossy(&frame));
//! }
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod framed;
pub mod subprocess;
pub mod traits;

pub use error::{Result, TransportError};
pub use framed::{DEFAULT_MAX_FRAME_SIZE, FramedTransport};
pub use subprocess::{CliTransport, ProcessConfig, ProcessHandle, StderrCallback, VersionCheck};
pub use traits::Transport;
