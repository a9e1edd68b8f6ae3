//! Process management for the CLI subprocess

use super::version::{self, VersionCheck};
use crate::error::{Result, TransportError};
use crate::framed::{DEFAULT_MAX_FRAME_SIZE, FramedTransport};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sink for the child's stderr, fed one line at a time
pub type StderrCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for spawning a CLI process
#[derive(Clone)]
pub struct ProcessConfig {
    /// Path to the CLI executable
    pub cli_path: PathBuf,

    /// Arguments to pass to the CLI
    pub args: Vec<String>,

    /// Environment variables layered over the inherited environment
    pub env: HashMap<String, String>,

    /// Working directory, or the parent's when `None`
    pub cwd: Option<PathBuf>,

    /// Maximum frame size in bytes; 0 disables the limit
    pub max_frame_size: usize,

    /// Optional stderr sink
    pub stderr: Option<StderrCallback>,

    /// Optional compatibility check run before spawning
    pub version_check: Option<Arc<dyn VersionCheck>>,

    /// Skip the compatibility check
    pub skip_version_check: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("claude")
    }
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("cli_path", &self.cli_path)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("cwd", &self.cwd)
            .field("max_frame_size", &self.max_frame_size)
            .field("stderr", &self.stderr.is_some())
            .field("version_check", &self.version_check.is_some())
            .field("skip_version_check", &self.skip_version_check)
            .finish()
    }
}

impl ProcessConfig {
    /// Create a new process configuration
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            stderr: None,
            version_check: None,
            skip_version_check: false,
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    ///
    /// The child inherits the parent's environment; variables set here
    /// override inherited values of the same name.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the maximum frame size; 0 disables the limit
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Send stderr lines to a callback instead of the debug log
    pub fn with_stderr<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.stderr = Some(Arc::new(callback));
        self
    }

    /// Run a compatibility check before spawning
    pub fn with_version_check(mut self, check: Arc<dyn VersionCheck>) -> Self {
        self.version_check = Some(check);
        self
    }

    /// Skip the compatibility check
    pub fn with_skip_version_check(mut self, skip: bool) -> Self {
        self.skip_version_check = skip;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

type ExitOutcome = std::result::Result<ExitStatus, String>;
type KillReply = oneshot::Sender<io::Result<()>>;

/// Handle to a running CLI process
///
/// The child itself is owned by a background exit observer; the handle
/// talks to it over channels, so any number of callers can wait or kill.
pub struct ProcessHandle {
    pid: Option<u32>,
    executable: String,
    exit: watch::Receiver<Option<ExitOutcome>>,
    kill_tx: mpsc::Sender<KillReply>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("executable", &self.executable)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProcessHandle {
    /// Spawn a new CLI process and wire its pipes into a framed transport
    ///
    /// The pipes are attached before this returns, so no output written by
    /// the child between start and the first read is lost.
    pub async fn spawn(config: ProcessConfig) -> Result<(Arc<FramedTransport>, Self)> {
        let executable = config.cli_path.display().to_string();

        if let Some(check) = &config.version_check {
            if version::should_skip(config.skip_version_check) {
                debug!(%executable, "version check skipped");
            } else {
                check.check(&config.cli_path).await?;
            }
        }

        let mut child = config
            .command()
            .spawn()
            .map_err(|source| TransportError::Spawn {
                executable: executable.clone(),
                source,
            })?;
        let pid = child.id();

        let stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingPipe("stderr"))?;

        info!(%executable, pid, "spawned CLI process");

        let transport = Arc::new(
            FramedTransport::new(Box::new(stdout), Box::new(stdin), config.max_frame_size)
                .with_diagnostics(Box::new(stderr)),
        );

        if let Some(diagnostics) = transport.take_diagnostics().await {
            tokio::spawn(pump_stderr(
                diagnostics,
                config.stderr.clone(),
                transport.close_signal(),
            ));
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = mpsc::channel(4);
        tokio::spawn(observe_exit(child, kill_rx, exit_tx));

        Ok((
            transport,
            Self {
                pid,
                executable,
                exit: exit_rx,
                kill_tx,
            },
        ))
    }

    /// OS process id, if the child was still running at spawn
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the exit observer has not yet seen the child exit
    pub fn is_running(&self) -> bool {
        self.exit.borrow().is_none()
    }

    /// Wait for the child to exit
    ///
    /// Exit is observed once; every caller sees the same status. A non-zero
    /// status is returned as a value, not an error.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<ExitStatus> {
        let mut exit = self.exit.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            outcome = exit.wait_for(Option::is_some) => outcome
                .map(|seen| (*seen).clone())
                .map_err(|_| TransportError::Process("exit observer stopped".to_string()))?,
        };
        match outcome {
            Some(Ok(status)) => Ok(status),
            Some(Err(reason)) => Err(TransportError::Wait(reason)),
            None => Err(TransportError::Process("exit observer stopped".to_string())),
        }
    }

    /// Forcefully terminate the child
    ///
    /// Killing a process that already exited succeeds.
    pub async fn kill(&self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.kill_tx.send(reply_tx).await.is_err() {
            return Ok(());
        }
        match reply_rx.await {
            Ok(Ok(())) | Err(_) => Ok(()),
            Ok(Err(e)) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Ok(Err(e)) => Err(TransportError::Kill(e)),
        }
    }
}

async fn observe_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<KillReply>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
) {
    let mut handle_open = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            request = kill_rx.recv(), if handle_open => match request {
                Some(reply) => {
                    let _ = reply.send(child.start_kill());
                }
                None => {
                    handle_open = false;
                    if let Err(e) = child.start_kill() {
                        debug!(error = %e, "kill after handle drop failed");
                    }
                }
            },
        }
    };

    let outcome = match status {
        Ok(status) => {
            info!(%status, "CLI process exited");
            Ok(status)
        }
        Err(e) => {
            warn!(error = %e, "failed to observe CLI exit");
            Err(e.to_string())
        }
    };
    exit_tx.send_replace(Some(outcome));
}

async fn pump_stderr(
    stderr: crate::framed::BoxedReader,
    sink: Option<StderrCallback>,
    closed: CancellationToken,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        let line = tokio::select! {
            _ = closed.cancelled() => break,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => match &sink {
                Some(sink) => sink(&line),
                None => debug!(target: "claudewire::stderr", "{line}"),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stderr reader stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_default() {
        let config = ProcessConfig::default();
        assert_eq!(config.cli_path, PathBuf::from("claude"));
        assert!(config.args.is_empty());
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert!(config.cwd.is_none());
    }

    #[test]
    fn test_process_config_builder() {
        let config = ProcessConfig::new("my-claude")
            .with_args(["--output-format", "stream-json"])
            .with_arg("--verbose")
            .with_env("API_KEY", "sk-123")
            .with_cwd("/tmp")
            .with_max_frame_size(0)
            .with_stderr(|_| {});

        assert_eq!(config.cli_path, PathBuf::from("my-claude"));
        assert_eq!(config.args, vec!["--output-format", "stream-json", "--verbose"]);
        assert_eq!(config.env.get("API_KEY"), Some(&"sk-123".to_string()));
        assert_eq!(config.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(config.max_frame_size, 0);
        assert!(config.stderr.is_some());
    }

    #[test]
    fn test_debug_hides_env_values() {
        let config = ProcessConfig::new("claude").with_env("ANTHROPIC_API_KEY", "sk-secret");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("ANTHROPIC_API_KEY"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = ProcessHandle::spawn(ProcessConfig::new("/nonexistent/claude-cli"))
            .await
            .unwrap_err();
        match err {
            TransportError::Spawn { executable, .. } => {
                assert_eq!(executable, "/nonexistent/claude-cli")
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }
}
