//! Streamable HTTP transport for remote MCP servers.
//!
//! - `send()` POSTs one JSON-RPC message and buffers whatever comes back,
//!   either a single JSON body or an SSE stream of messages
//! - `receive()` pops buffered messages in arrival order
//! - the `Mcp-Session-Id` header is captured and echoed on later requests
//! - `close()` sends a DELETE so the server can drop the session

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::sse;
use crate::transport::Transport;

const SESSION_HEADER: &str = "mcp-session-id";

/// Upper bound for the DELETE that ends a session.
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP transport for MCP servers.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    headers: HeaderMap,
    session_id: Option<String>,
    pending: VecDeque<String>,
    connected: bool,
}

impl HttpTransport {
    /// Create a transport for `url` with extra headers and an optional bearer token.
    pub fn new(
        url: &str,
        extra_headers: &BTreeMap<String, String>,
        bearer_token: Option<&str>,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );

        for (key, value) in extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                TransportError::Http(format!("invalid header name '{}': {}", key, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::Http(format!("invalid value for header '{}': {}", key, e))
            })?;
            headers.insert(name, value);
        }

        if let Some(token) = bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TransportError::Http(format!("invalid bearer token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client,
            headers,
            session_id: None,
            pending: VecDeque::new(),
            connected: true,
        })
    }

    /// Session ID assigned by the server, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(ref session_id) = self.session_id {
            if let Ok(value) = HeaderValue::from_str(session_id) {
                headers.insert(HeaderName::from_static(SESSION_HEADER), value);
            }
        }
        headers
    }

    /// Buffer the messages carried by one response body.
    fn buffer_body(&mut self, content_type: &str, body: &str) {
        if body.trim().is_empty() {
            return;
        }

        if content_type.contains("text/event-stream") {
            for event in sse::parse_events(body) {
                if event.is_message() {
                    self.pending.push_back(event.data);
                } else {
                    debug!(event = ?event.event, "Ignoring non-message SSE event");
                }
            }
        } else {
            self.pending.push_back(body.to_string());
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        debug!(url = %self.url, message = message, "POSTing message to MCP server");

        let response = self
            .client
            .post(&self.url)
            .headers(self.request_headers())
            .body(message.to_string())
            .send()
            .await
            .map_err(|e| TransportError::Http(format!("request failed: {}", e)))?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session_id) {
                debug!(session_id = session_id, "Captured MCP session ID");
                self.session_id = Some(session_id.to_string());
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!("unexpected status {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Http(format!("failed to read response body: {}", e)))?;

        self.buffer_body(&content_type, &body);
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        let message = self
            .pending
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)?;
        debug!(message = %message, "Received message from MCP server");
        Ok(message)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.pending.clear();

        if self.session_id.is_some() {
            debug!(url = %self.url, "Terminating MCP HTTP session");
            if let Err(e) = self
                .client
                .delete(&self.url)
                .headers(self.request_headers())
                .timeout(SESSION_CLOSE_TIMEOUT)
                .send()
                .await
            {
                warn!(url = %self.url, error = %e, "Failed to terminate MCP session");
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
