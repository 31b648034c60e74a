//! Error types for mcpdocs.
//!
//! Configuration problems are reported through [`ConfigurationError`], which is
//! always raised before any server is contacted. The crate-wide [`Error`]
//! collects every failure a build can surface, with recovery suggestions.

use thiserror::Error;

/// Result type alias using the crate-wide error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mcpdocs.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Fetching metadata from a server failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// A directive named a server that is not configured
    #[error("{0}")]
    UnknownServer(String),

    /// Rendering a document failed
    #[error("Render error: {0}")]
    Render(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Configuration(e) => e.recovery_suggestion(),
            Error::Fetch(_) => Some(
                "Check that the server starts on its own, or set fetch_policy = \"isolate\"",
            ),
            Error::UnknownServer(_) => {
                Some("Use 'mcpdocs check' to list the configured server names")
            }
            _ => None,
        }
    }
}

/// Errors raised while validating the MCP server configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No `mcp_config` table, or it has no `mcpServers` mapping.
    #[error("No valid MCP configuration found: expected `mcp_config.mcpServers`")]
    MissingConfig,

    /// The `mcpServers` mapping is empty.
    #[error("No MCP servers configured")]
    EmptyServerList,

    /// More than one server while the single-server policy is set.
    #[error(
        "Multiple MCP servers configured ({count}) but 'allow_only_one_mcp_server' is set to true"
    )]
    TooManyServers { count: usize },

    /// A server's transport descriptor cannot be resolved.
    #[error("Invalid transport for MCP server '{server}': {reason}")]
    InvalidTransport { server: String, reason: String },

    /// A scalar setting is out of range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// The configuration sources could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigurationError {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            ConfigurationError::MissingConfig | ConfigurationError::EmptyServerList => {
                Some("Add at least one [mcp_config.mcpServers.<name>] table to mcpdocs.toml")
            }
            ConfigurationError::TooManyServers { .. } => Some(
                "Remove the extra servers or set allow_only_one_mcp_server = false",
            ),
            ConfigurationError::InvalidTransport { .. } => {
                Some("Give each server either `command` (stdio) or `url` (http), not both")
            }
            _ => None,
        }
    }

    /// Create an invalid transport error.
    pub fn invalid_transport(server: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTransport {
            server: server.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_servers_message() {
        let err = ConfigurationError::TooManyServers { count: 3 };
        assert!(err.to_string().contains("(3)"));
        assert!(err.to_string().contains("allow_only_one_mcp_server"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_configuration_error_into_error() {
        let err: Error = ConfigurationError::EmptyServerList.into();
        assert!(matches!(err, Error::Configuration(ConfigurationError::EmptyServerList)));
        assert_eq!(err.to_string(), "No MCP servers configured");
    }

    #[test]
    fn test_format_with_suggestion() {
        let err = Error::UnknownServer("No MCP server specification exists by the name 'x'".into());
        let formatted = format_error_with_suggestion(&err);
        assert!(formatted.contains("'x'"));
        assert!(formatted.contains("Suggestion: "));

        let err = Error::Render("bad fence".into());
        assert_eq!(format_error_with_suggestion(&err), "Render error: bad fence");
    }
}
