//! MCP transport implementations.
//!
//! A transport moves raw JSON-RPC messages to and from one server. The stdio
//! transport spawns a child process and speaks newline-delimited JSON over
//! its stdin/stdout; the HTTP transport lives in [`crate::http`].

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::TransportError;

/// How long a stdio server may take to exit after SIGTERM.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Trait for MCP transport implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a message to the server.
    async fn send(&mut self, message: &str) -> Result<(), TransportError>;

    /// Receive a message from the server.
    async fn receive(&mut self) -> Result<String, TransportError>;

    /// Close the transport connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;
}

/// Standard I/O transport for MCP servers.
pub struct StdioTransport {
    /// The child process.
    child: Child,
    /// Stdin writer for sending messages.
    stdin: ChildStdin,
    /// Buffered stdout reader for receiving messages.
    stdout: BufReader<ChildStdout>,
    /// Whether the transport is connected.
    connected: bool,
}

impl StdioTransport {
    /// Spawn a new stdio transport.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to execute (e.g., "python" or "/path/to/server")
    /// * `args` - Command arguments
    /// * `env` - Extra environment variables for the child process
    /// * `working_dir` - Optional working directory for the child process
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        working_dir: Option<&Path>,
    ) -> Result<Self, TransportError> {
        debug!(command = command, args = ?args, "Spawning MCP server process");

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(TransportError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::SpawnFailed(std::io::Error::other("Failed to capture stdin"))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::SpawnFailed(std::io::Error::other("Failed to capture stdout"))
        })?;

        debug!(pid = ?child.id(), "MCP server process spawned");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            connected: true,
        })
    }

    /// Get the process ID of the child process.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        debug!(message = message, "Sending message to MCP server");

        let mut frame = Vec::with_capacity(message.len() + 1);
        frame.extend_from_slice(message.as_bytes());
        frame.push(b'\n');

        self.stdin
            .write_all(&frame)
            .await
            .map_err(TransportError::WriteError)?;
        self.stdin.flush().await.map_err(TransportError::WriteError)
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        loop {
            let mut line = String::new();
            let bytes_read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(TransportError::ReadError)?;

            if bytes_read == 0 {
                self.connected = false;
                return Err(TransportError::ConnectionClosed);
            }

            let message = line.trim_end();
            if message.is_empty() {
                continue;
            }

            debug!(message = message, "Received message from MCP server");
            return Ok(message.to_string());
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }

        debug!("Closing MCP server transport");
        self.connected = false;
        terminate(&mut self.child).await;

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Ask the child to exit, killing it if it outlives [`SHUTDOWN_GRACE`].
async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        debug!(pid = pid, "Sending SIGTERM to MCP server");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!(pid = pid, error = %e, "SIGTERM failed");
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(status) => debug!(pid = pid, status = ?status, "MCP server exited"),
            Err(_) => {
                warn!(pid = pid, "MCP server did not exit gracefully, killing");
                let _ = child.kill().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        debug!(pid = pid, "Killing MCP server");
        let _ = child.kill().await;
    }
}
