//! Scripted transports for exercising the fetch pipeline without real servers.
//!
//! A [`ScriptedTransport`] replies to requests from per-method queues.
//! `initialize` with nothing queued gets a handshake result built from the
//! scripted capabilities; other methods with nothing queued get an empty
//! result. Every message it sees is recorded in a shared [`Transcript`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcpdocs_core::ServerConfig;
use serde_json::{json, Value};

use crate::client::Connector;
use crate::error::TransportError;
use crate::protocol::MCP_PROTOCOL_VERSION;
use crate::transport::Transport;

/// One scripted reply.
#[derive(Debug, Clone)]
enum Reply {
    Result(Value),
    Error { code: i32, message: String },
    Disconnect,
}

#[derive(Debug, Default)]
struct TranscriptInner {
    requests: Vec<Value>,
    closed: bool,
}

/// Shared record of what a scripted transport was sent.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    inner: Arc<Mutex<TranscriptInner>>,
}

impl Transcript {
    /// Every message sent to the transport, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.inner
            .lock()
            .map(|inner| inner.requests.clone())
            .unwrap_or_default()
    }

    /// Methods of the messages sent, in order.
    pub fn methods(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r["method"].as_str().map(str::to_string))
            .collect()
    }

    /// Whether `close()` was called.
    pub fn closed(&self) -> bool {
        self.inner.lock().map(|inner| inner.closed).unwrap_or(false)
    }

    fn record(&self, message: Value) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.requests.push(message);
        }
    }

    fn mark_closed(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
    }
}

/// In-memory transport that replays scripted replies.
#[derive(Debug)]
pub struct ScriptedTransport {
    capabilities: Value,
    replies: HashMap<String, VecDeque<Reply>>,
    delays: HashMap<String, Duration>,
    preludes: HashMap<String, Vec<Value>>,
    pending: VecDeque<Result<String, ()>>,
    delay: Option<Duration>,
    close_delay: Option<Duration>,
    transcript: Transcript,
    connected: bool,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// A transport whose server offers tools, prompts and resources.
    pub fn new() -> Self {
        Self {
            capabilities: json!({"tools": {}, "prompts": {}, "resources": {}}),
            replies: HashMap::new(),
            delays: HashMap::new(),
            preludes: HashMap::new(),
            pending: VecDeque::new(),
            delay: None,
            close_delay: None,
            transcript: Transcript::default(),
            connected: true,
        }
    }

    /// Replace the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Queue a successful result for `method`.
    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.push(method, Reply::Result(result));
        self
    }

    /// Queue a JSON-RPC error for `method`.
    pub fn with_error(mut self, method: &str, code: i32, message: &str) -> Self {
        self.push(
            method,
            Reply::Error {
                code,
                message: message.to_string(),
            },
        );
        self
    }

    /// Drop the connection when `method` is requested.
    pub fn with_disconnect(mut self, method: &str) -> Self {
        self.push(method, Reply::Disconnect);
        self
    }

    /// Hold back the reply to `method` for `delay`. For a notification the
    /// send itself is held back.
    pub fn with_delay(mut self, method: &str, delay: Duration) -> Self {
        self.delays.insert(method.to_string(), delay);
        self
    }

    /// Hold back `close()` for `delay`.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// Send `message` ahead of the reply to `method`.
    pub fn with_notification_before(mut self, method: &str, message: Value) -> Self {
        self.preludes
            .entry(method.to_string())
            .or_default()
            .push(message);
        self
    }

    /// Handle onto the transcript of this transport.
    pub fn log(&self) -> Transcript {
        self.transcript.clone()
    }

    fn push(&mut self, method: &str, reply: Reply) {
        self.replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    fn reply_for(&mut self, method: &str) -> Reply {
        if let Some(reply) = self.replies.get_mut(method).and_then(VecDeque::pop_front) {
            return reply;
        }

        if method == "initialize" {
            Reply::Result(json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": self.capabilities,
                "serverInfo": {"name": "scripted", "version": "0.0.0"}
            }))
        } else {
            Reply::Result(json!({}))
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        let request: Value = serde_json::from_str(message).map_err(|e| {
            TransportError::WriteError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.transcript.record(request.clone());

        let method = request["method"].as_str().unwrap_or_default().to_string();
        let Some(id) = request.get("id").cloned() else {
            if let Some(delay) = self.delays.get(&method).copied() {
                tokio::time::sleep(delay).await;
            }
            return Ok(());
        };

        for prelude in self.preludes.remove(&method).unwrap_or_default() {
            self.pending.push_back(Ok(prelude.to_string()));
        }

        self.delay = self.delays.get(&method).copied();

        let response = match self.reply_for(&method) {
            Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Reply::Error { code, message } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": code, "message": message}
            }),
            Reply::Disconnect => {
                self.pending.push_back(Err(()));
                return Ok(());
            }
        };
        self.pending.push_back(Ok(response.to_string()));

        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(delay) = self.delay.take() {
            tokio::time::sleep(delay).await;
        }

        match self.pending.pop_front() {
            Some(Ok(message)) => Ok(message),
            Some(Err(())) | None => {
                self.connected = false;
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(delay) = self.close_delay.take() {
            tokio::time::sleep(delay).await;
        }
        self.connected = false;
        self.transcript.mark_closed();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Connector that hands out scripted transports by server name.
///
/// Servers without a script fail to connect.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    scripts: Mutex<BTreeMap<String, ScriptedTransport>>,
    transcripts: BTreeMap<String, Transcript>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the transport handed out for `name`.
    pub fn with_server(mut self, name: &str, transport: ScriptedTransport) -> Self {
        self.transcripts.insert(name.to_string(), transport.log());
        if let Ok(scripts) = self.scripts.get_mut() {
            scripts.insert(name.to_string(), transport);
        }
        self
    }

    /// Transcript of the transport scripted for `name`.
    pub fn transcript(&self, name: &str) -> Option<Transcript> {
        self.transcripts.get(name).cloned()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, server: &ServerConfig) -> Result<Box<dyn Transport>, TransportError> {
        let transport = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.remove(&server.name));

        match transport {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no script for server '{}'", server.name),
            ))),
        }
    }
}
