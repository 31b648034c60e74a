//! Server selection for directives.

use crate::error::UnknownServerError;
use crate::store::ArtifactMap;

/// Separator between server and entry name in prefixed display names.
pub const DISPLAY_SEPARATOR: &str = "::";

/// An optional restriction of a directive to one server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerFilter<'a> {
    server: Option<&'a str>,
}

impl<'a> ServerFilter<'a> {
    pub fn new(server: Option<&'a str>) -> Self {
        Self { server }
    }

    /// All servers are eligible.
    pub fn all() -> Self {
        Self { server: None }
    }

    /// The requested server, if any.
    pub fn server(&self) -> Option<&'a str> {
        self.server
    }

    /// Fail if the requested server is not a key of `map`.
    pub fn check<T>(&self, map: &ArtifactMap<T>) -> Result<(), UnknownServerError> {
        match self.server {
            Some(server) if !map.contains(server) => Err(UnknownServerError {
                requested: server.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether entries of `server` pass the filter.
    pub fn admits(&self, server: &str) -> bool {
        self.server.map_or(true, |wanted| wanted == server)
    }

    /// Name shown for an entry: bare when filtered, `server::name` otherwise.
    pub fn display_name(&self, server: &str, name: &str) -> String {
        if self.server.is_some() {
            name.to_string()
        } else {
            format!("{}{}{}", server, DISPLAY_SEPARATOR, name)
        }
    }
}
