//! Subprocess transport for CLI communication
//!
//! Spawns the Claude Code CLI with three piped streams: stdin and stdout
//! carry frames, stderr is drained line by line into a sink or the log.

pub mod cli;
pub mod process;
pub mod version;

pub use cli::CliTransport;
pub use process::{ProcessConfig, ProcessHandle, StderrCallback};
pub use version::{SKIP_VERSION_CHECK_ENV, VersionCheck};
