//! Configuration system for mcpdocs.
//!
//! The host configuration carries an `mcp_config` table whose `mcpServers`
//! mapping names every MCP server to document:
//!
//! ```toml
//! allow_only_one_mcp_server = false
//!
//! [mcp_config.mcpServers.pymcp]
//! transport = "stdio"
//! command = "python"
//! args = ["-m", "pymcp.server"]
//!
//! [mcp_config.mcpServers.remote]
//! url = "https://mcp.example.com/mcp"
//! bearer_token = "secret"
//! ```
//!
//! [`Config::validate`] turns that mapping into a [`ServerRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Name of the servers collection inside `mcp_config`.
pub const SERVERS_KEY: &str = "mcpServers";

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "mcpdocs.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "MCPDOCS_";

/// Main configuration struct for mcpdocs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reject configurations with more than one server
    pub allow_only_one_mcp_server: bool,
    /// Upper bound for a single request to a server, in seconds
    pub request_timeout_secs: u64,
    /// What a failing server does to the rest of the build
    pub fetch_policy: FetchPolicy,
    /// Fetch all servers at once instead of one after another
    pub concurrent_fetch: bool,
    /// MCP server definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<McpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_only_one_mcp_server: false,
            request_timeout_secs: 30,
            fetch_policy: FetchPolicy::default(),
            concurrent_fetch: true,
            mcp_config: None,
        }
    }
}

/// The `mcp_config` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server name to transport descriptor.
    #[serde(
        rename = "mcpServers",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub servers: Option<BTreeMap<String, RawServerConfig>>,
}

impl McpConfig {
    /// Create a configuration with an empty `mcpServers` mapping.
    pub fn new() -> Self {
        Self {
            servers: Some(BTreeMap::new()),
        }
    }

    /// Add a server.
    pub fn with_server(mut self, name: impl Into<String>, server: RawServerConfig) -> Self {
        self.servers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), server);
        self
    }
}

/// How the build reacts when one server cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// The first failing server fails the whole build.
    #[default]
    FailFast,
    /// Record the failure, keep what was retrieved, continue with other servers.
    Isolate,
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Isolate => write!(f, "isolate"),
        }
    }
}

/// A server entry as written in the configuration file.
///
/// The transport kind may be omitted; it is inferred from whether `command`
/// or `url` is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawServerConfig {
    /// Transport kind: `stdio`, `http`, `streamable-http` or `sse`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Command to spawn (stdio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Command arguments (stdio)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment variables (stdio)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory (stdio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Endpoint (http)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Extra request headers (http)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Sent as `Authorization: Bearer <token>` (http)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl RawServerConfig {
    /// Create a stdio server entry.
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    /// Create an HTTP server entry.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Add arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the transport kind explicitly.
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    /// Set the bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Resolve this entry into a typed transport.
    fn resolve(&self, name: &str) -> Result<TransportConfig, ConfigurationError> {
        let kind = self.transport.as_deref().map(str::to_ascii_lowercase);

        match (&self.command, &self.url) {
            (Some(_), Some(_)) => Err(ConfigurationError::invalid_transport(
                name,
                "both `command` and `url` are set",
            )),
            (None, None) => Err(ConfigurationError::invalid_transport(
                name,
                "neither `command` nor `url` is set",
            )),
            (Some(command), None) => {
                match kind.as_deref() {
                    None | Some("stdio") => {}
                    Some(other) => {
                        return Err(ConfigurationError::invalid_transport(
                            name,
                            format!("transport '{}' cannot be used with `command`", other),
                        ))
                    }
                }
                if command.trim().is_empty() {
                    return Err(ConfigurationError::invalid_transport(
                        name,
                        "`command` is empty",
                    ));
                }
                Ok(TransportConfig::Stdio {
                    command: command.clone(),
                    args: self.args.clone(),
                    env: self.env.clone(),
                    cwd: self.cwd.clone(),
                })
            }
            (None, Some(url)) => {
                match kind.as_deref() {
                    None | Some("http") | Some("streamable-http") | Some("sse") => {}
                    Some(other) => {
                        return Err(ConfigurationError::invalid_transport(
                            name,
                            format!("transport '{}' cannot be used with `url`", other),
                        ))
                    }
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigurationError::invalid_transport(
                        name,
                        "`url` must start with http:// or https://",
                    ));
                }
                Ok(TransportConfig::Http {
                    url: url.clone(),
                    headers: self.headers.clone(),
                    bearer_token: self.bearer_token.clone(),
                })
            }
        }
    }
}

/// A resolved transport descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Spawn a local process and speak newline-delimited JSON-RPC.
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    },
    /// POST JSON-RPC to a streamable HTTP endpoint.
    Http {
        url: String,
        headers: BTreeMap<String, String>,
        bearer_token: Option<String>,
    },
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio { command, args, .. } => {
                write!(f, "stdio: {}", command)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            Self::Http { url, .. } => write!(f, "http: {}", url),
        }
    }
}

/// One validated MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Unique server name.
    pub name: String,
    /// How to reach the server.
    pub transport: TransportConfig,
}

/// Validated servers, in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerRegistry {
    servers: Vec<ServerConfig>,
}

impl ServerRegistry {
    /// Number of servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Server names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|s| s.name.as_str())
    }

    /// Look up a server by name.
    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Iterate over servers in registry order.
    pub fn iter(&self) -> std::slice::Iter<'_, ServerConfig> {
        self.servers.iter()
    }
}

impl IntoIterator for ServerRegistry {
    type Item = ServerConfig;
    type IntoIter = std::vec::IntoIter<ServerConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.into_iter()
    }
}

impl<'a> IntoIterator for &'a ServerRegistry {
    type Item = &'a ServerConfig;
    type IntoIter = std::slice::Iter<'a, ServerConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.servers.iter()
    }
}

impl Config {
    /// Load configuration from a TOML file and `MCPDOCS_*` environment variables.
    ///
    /// A missing file is not an error here; [`Config::validate`] reports the
    /// absent server mapping instead.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self::figment(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigurationError> {
        Self::figment(Toml::string(toml))
            .extract()
            .map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    fn figment(source: impl Provider) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(source)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration and build the server registry.
    pub fn validate(&self) -> Result<ServerRegistry, ConfigurationError> {
        let servers = self
            .mcp_config
            .as_ref()
            .and_then(|c| c.servers.as_ref())
            .ok_or(ConfigurationError::MissingConfig)?;

        if servers.is_empty() {
            return Err(ConfigurationError::EmptyServerList);
        }

        if self.allow_only_one_mcp_server && servers.len() > 1 {
            return Err(ConfigurationError::TooManyServers {
                count: servers.len(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "request_timeout_secs",
                "must be greater than 0",
            ));
        }

        let mut registry = ServerRegistry::default();
        for (name, raw) in servers {
            if raw.bearer_token.as_ref().is_some_and(|t| t.is_empty()) {
                tracing::warn!(server = %name, "Config warning - bearer_token is empty string");
            }
            registry.servers.push(ServerConfig {
                name: name.clone(),
                transport: raw.resolve(name)?,
            });
        }

        Ok(registry)
    }
}
