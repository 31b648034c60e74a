//! MCP client implementation.
//!
//! This module provides `McpConnection`, a session with a single MCP server,
//! and the `Connector` seam that opens transports for configured servers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcpdocs_core::{ServerConfig, TransportConfig};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{McpError, TransportError};
use crate::http::HttpTransport;
use crate::manifest::ManifestKind;
use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    Page, PaginatedParams, ServerCapabilities,
};
use crate::transport::{StdioTransport, Transport};

/// Default upper bound for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Guard against servers that hand out cursors forever.
const MAX_PAGES: usize = 1000;

/// Connection state for an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Connected but not initialized.
    Connected,
    /// Connection established and initialized.
    Ready,
    /// Connection is being closed.
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
            Self::Ready => write!(f, "ready"),
            Self::Closing => write!(f, "closing"),
        }
    }
}

/// A session with a single MCP server.
pub struct McpConnection {
    /// Server name.
    name: String,
    /// Transport for communication.
    transport: Mutex<Box<dyn Transport>>,
    /// Current connection state.
    state: RwLock<ConnectionState>,
    /// Server capabilities after initialization.
    server_capabilities: RwLock<Option<ServerCapabilities>>,
    /// Request ID counter.
    request_counter: AtomicU64,
    /// Upper bound for each request/response exchange.
    timeout: Duration,
}

impl McpConnection {
    /// Create a new connection with an existing transport.
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport: Mutex::new(transport),
            state: RwLock::new(ConnectionState::Connected),
            server_capabilities: RwLock::new(None),
            request_counter: AtomicU64::new(1),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the server capabilities.
    pub async fn capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.read().await.clone()
    }

    /// Whether the server advertised support for a manifest kind.
    pub async fn supports(&self, kind: ManifestKind) -> bool {
        let capabilities = self.server_capabilities.read().await;
        let Some(capabilities) = capabilities.as_ref() else {
            return false;
        };
        match kind {
            ManifestKind::Tools => capabilities.tools.is_some(),
            ManifestKind::Prompts => capabilities.prompts.is_some(),
            ManifestKind::Resources | ManifestKind::ResourceTemplates => {
                capabilities.resources.is_some()
            }
        }
    }

    /// Generate a new request ID.
    fn next_request_id(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and wait for the matching response.
    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R, McpError>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let response_json = tokio::time::timeout(self.timeout, self.exchange(id, &request_json))
            .await
            .map_err(|_| McpError::Timeout(self.timeout))??;

        let response: JsonRpcResponse<R> = serde_json::from_value(response_json)
            .map_err(|e| {
                McpError::protocol(format!("Failed to parse {} response: {}", method, e))
            })?;

        if let Some(error) = response.error {
            return Err(McpError::server_error(error.code, error.message));
        }

        response
            .result
            .ok_or_else(|| McpError::protocol(format!("{} response missing result", method)))
    }

    /// Write one request and read until its response arrives.
    ///
    /// Notifications and server-initiated requests interleaved with the
    /// response are skipped.
    async fn exchange(&self, id: u64, request_json: &str) -> Result<Value, McpError> {
        let mut transport = self.transport.lock().await;
        transport.send(request_json).await?;

        loop {
            let message = transport.receive().await?;
            let value: Value = serde_json::from_str(&message)
                .map_err(|e| McpError::protocol(format!("Malformed message: {}", e)))?;

            if value.get("method").is_some() {
                debug!(
                    server = %self.name,
                    method = ?value.get("method"),
                    "Skipping server-initiated message"
                );
                continue;
            }

            if value.get("id").and_then(Value::as_u64) == Some(id) {
                return Ok(value);
            }

            debug!(
                server = %self.name,
                id = ?value.get("id"),
                "Skipping response to another request"
            );
        }
    }

    /// Send a notification (no response expected).
    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<(), McpError>
    where
        P: serde::Serialize,
    {
        let notification = JsonRpcNotification::new(method, params);
        let notification_json = serde_json::to_string(&notification)?;

        let send = async {
            let mut transport = self.transport.lock().await;
            transport.send(&notification_json).await
        };
        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| McpError::Timeout(self.timeout))??;

        Ok(())
    }

    /// Initialize the connection with the server.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let state = *self.state.read().await;
        if state != ConnectionState::Connected {
            return Err(McpError::invalid_state("connected", state.to_string()));
        }

        debug!(server = %self.name, "Initializing MCP connection");

        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        *self.server_capabilities.write().await = Some(result.capabilities.clone());

        self.notify::<()>("notifications/initialized", None).await?;

        *self.state.write().await = ConnectionState::Ready;

        info!(
            server = %self.name,
            server_name = %result.server_info.name,
            protocol_version = %result.protocol_version,
            "MCP connection initialized"
        );

        Ok(result)
    }

    /// List every entry of one kind, following pagination cursors.
    pub async fn list_all<R>(&self, kind: ManifestKind) -> Result<Vec<R::Item>, McpError>
    where
        R: Page,
    {
        let state = *self.state.read().await;
        if state != ConnectionState::Ready {
            return Err(McpError::invalid_state("ready", state.to_string()));
        }

        let method = kind.method();
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            debug!(server = %self.name, method = method, cursor = ?cursor, "Listing");

            let params = cursor.take().map(|cursor| PaginatedParams {
                cursor: Some(cursor),
            });
            let page: R = self.request(method, params).await?;
            let (entries, next_cursor) = page.into_parts();
            items.extend(entries);

            match next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }
        }

        Err(McpError::protocol(format!(
            "{} did not finish after {} pages",
            method, MAX_PAGES
        )))
    }

    /// Close the connection.
    pub async fn close(&self) -> Result<(), McpError> {
        let state = *self.state.read().await;
        if state == ConnectionState::Disconnected {
            return Ok(());
        }

        *self.state.write().await = ConnectionState::Closing;

        debug!(server = %self.name, "Closing MCP connection");

        let shutdown = async {
            let mut transport = self.transport.lock().await;
            transport.close().await
        };
        let result = tokio::time::timeout(self.timeout, shutdown).await;

        *self.state.write().await = ConnectionState::Disconnected;

        result.map_err(|_| McpError::Timeout(self.timeout))??;
        debug!(server = %self.name, "MCP connection closed");
        Ok(())
    }
}

/// Opens a transport for a configured server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh transport for `server`.
    async fn connect(&self, server: &ServerConfig) -> Result<Box<dyn Transport>, TransportError>;
}

/// Connector that spawns stdio servers and reaches HTTP servers over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, server: &ServerConfig) -> Result<Box<dyn Transport>, TransportError> {
        info!(server = %server.name, transport = %server.transport, "Connecting to MCP server");

        match &server.transport {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => {
                let transport = StdioTransport::spawn(command, args, env, cwd.as_deref()).await?;
                Ok(Box::new(transport))
            }
            TransportConfig::Http {
                url,
                headers,
                bearer_token,
            } => {
                let transport = HttpTransport::new(url, headers, bearer_token.as_deref())?;
                Ok(Box::new(transport))
            }
        }
    }
}
