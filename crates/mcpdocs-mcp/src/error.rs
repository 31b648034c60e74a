//! MCP-specific error types.

use std::fmt;
use std::time::Duration;

use mcpdocs_core::ConfigurationError;
use thiserror::Error;

use crate::manifest::ManifestKind;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    SpawnFailed(std::io::Error),

    /// Failed to write to the transport.
    #[error("write error: {0}")]
    WriteError(std::io::Error),

    /// Failed to read from the transport.
    #[error("read error: {0}")]
    ReadError(std::io::Error),

    /// Connection was closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport is not connected.
    #[error("not connected")]
    NotConnected,

    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Errors that can occur during MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol-level error (malformed messages, invalid payloads).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server returned an error response.
    #[error("server error (code {code}): {message}")]
    ServerError { code: i32, message: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Connection is not in the correct state.
    #[error("invalid connection state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl McpError {
    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from JSON-RPC error.
    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this error is a request timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// The step of a server's fetch sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    /// Opening the transport or the initialize handshake.
    Connect,
    /// Listing one manifest kind.
    Retrieve(ManifestKind),
}

impl fmt::Display for FetchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection"),
            Self::Retrieve(kind) => write!(f, "listing {}", kind),
        }
    }
}

/// Fetching one server's manifest failed.
#[derive(Debug, Error)]
#[error("MCP server '{server}': {step} failed: {source}")]
pub struct ServerFetchError {
    /// Server name.
    pub server: String,
    /// Step that failed.
    pub step: FetchStep,
    /// Underlying cause.
    #[source]
    pub source: McpError,
}

impl ServerFetchError {
    pub fn new(server: impl Into<String>, step: FetchStep, source: McpError) -> Self {
        Self {
            server: server.into(),
            step,
            source,
        }
    }
}

/// A directive named a server that is not in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No MCP server specification exists by the name '{requested}'.")]
pub struct UnknownServerError {
    /// The name the directive asked for.
    pub requested: String,
}

/// Errors that abort build initialization.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configuration is unusable; no server was contacted.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A server could not be fetched under the fail-fast policy.
    #[error(transparent)]
    Fetch(#[from] ServerFetchError),

    /// The async runtime for the fetch pass could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}

/// Errors raised while expanding directives in a document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The directive filtered on an unknown server.
    #[error("line {line}: {source}")]
    UnknownServer {
        line: usize,
        #[source]
        source: UnknownServerError,
    },

    /// The directive name is not one of the four manifest kinds.
    #[error("line {line}: unknown directive 'mcpdocs:{name}'")]
    UnknownDirective { line: usize, name: String },

    /// The directive block has a problem of its own.
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },
}

impl From<McpError> for mcpdocs_core::Error {
    fn from(e: McpError) -> Self {
        mcpdocs_core::Error::Fetch(e.to_string())
    }
}

impl From<BuildError> for mcpdocs_core::Error {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Configuration(e) => mcpdocs_core::Error::Configuration(e),
            BuildError::Fetch(e) => mcpdocs_core::Error::Fetch(e.to_string()),
            BuildError::Runtime(e) => mcpdocs_core::Error::Io(e),
        }
    }
}

impl From<UnknownServerError> for mcpdocs_core::Error {
    fn from(e: UnknownServerError) -> Self {
        mcpdocs_core::Error::UnknownServer(e.to_string())
    }
}

impl From<RenderError> for mcpdocs_core::Error {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::UnknownServer { .. } => mcpdocs_core::Error::UnknownServer(e.to_string()),
            other => mcpdocs_core::Error::Render(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectionClosed;
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn test_mcp_error_display() {
        let err = McpError::server_error(-32601, "Method not found");
        assert_eq!(err.to_string(), "server error (code -32601): Method not found");

        let err = McpError::Timeout(Duration::from_millis(250));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "request timed out after 250ms");
    }

    #[test]
    fn test_fetch_error_names_server_and_step() {
        let err = ServerFetchError::new(
            "alpha",
            FetchStep::Retrieve(ManifestKind::Prompts),
            McpError::protocol("bad page"),
        );
        assert_eq!(
            err.to_string(),
            "MCP server 'alpha': listing prompts failed: protocol error: bad page"
        );

        let err = ServerFetchError::new(
            "beta",
            FetchStep::Connect,
            TransportError::ConnectionClosed.into(),
        );
        assert_eq!(
            err.to_string(),
            "MCP server 'beta': connection failed: transport error: connection closed"
        );
    }

    #[test]
    fn test_unknown_server_message() {
        let err = UnknownServerError {
            requested: "gamma".into(),
        };
        assert_eq!(
            err.to_string(),
            "No MCP server specification exists by the name 'gamma'."
        );
        let core: mcpdocs_core::Error = err.into();
        assert!(matches!(core, mcpdocs_core::Error::UnknownServer(_)));
    }

    #[test]
    fn test_build_error_to_core_error() {
        let err = BuildError::Configuration(ConfigurationError::MissingConfig);
        let core: mcpdocs_core::Error = err.into();
        assert!(matches!(
            core,
            mcpdocs_core::Error::Configuration(ConfigurationError::MissingConfig)
        ));
    }
}
