//! The per-server metadata store published after the fetch pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mcpdocs_core::ServerRegistry;

use crate::error::ServerFetchError;
use crate::manifest::{ManifestKind, ServerManifest};
use crate::protocol::{Prompt, Resource, ResourceTemplate, Tool};

/// Server name to entries of one manifest kind.
///
/// Every configured server has a key, possibly with no entries.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMap<T> {
    entries: BTreeMap<String, Vec<T>>,
}

impl<T> Default for ArtifactMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> ArtifactMap<T> {
    /// Entries for `server`, or `None` if the server is not configured.
    pub fn get(&self, server: &str) -> Option<&[T]> {
        self.entries.get(server).map(Vec::as_slice)
    }

    /// Whether `server` is a key.
    pub fn contains(&self, server: &str) -> bool {
        self.entries.contains_key(server)
    }

    /// Server names, in registry order.
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(server, entries)` pairs, in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(server, entries)| (server.as_str(), entries.as_slice()))
    }

    /// Number of servers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries across all servers.
    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub(crate) fn insert_empty(&mut self, server: &str) {
        self.entries.entry(server.to_string()).or_default();
    }

    pub(crate) fn set(&mut self, server: &str, entries: Vec<T>) {
        self.entries.insert(server.to_string(), entries);
    }
}

/// Manifests of every configured server, grouped by kind.
#[derive(Debug)]
pub struct MetadataStore {
    tools: ArtifactMap<Tool>,
    prompts: ArtifactMap<Prompt>,
    resources: ArtifactMap<Resource>,
    resource_templates: ArtifactMap<ResourceTemplate>,
    failures: Vec<ServerFetchError>,
    fetched_at: DateTime<Utc>,
}

impl MetadataStore {
    /// A store with one empty entry list per kind for every server.
    pub(crate) fn for_registry(registry: &ServerRegistry) -> Self {
        let mut store = Self {
            tools: ArtifactMap::default(),
            prompts: ArtifactMap::default(),
            resources: ArtifactMap::default(),
            resource_templates: ArtifactMap::default(),
            failures: Vec::new(),
            fetched_at: Utc::now(),
        };
        for name in registry.names() {
            store.tools.insert_empty(name);
            store.prompts.insert_empty(name);
            store.resources.insert_empty(name);
            store.resource_templates.insert_empty(name);
        }
        store
    }

    /// Store everything retrieved from `server`.
    pub(crate) fn record(&mut self, server: &str, manifest: ServerManifest) {
        self.tools.set(server, manifest.tools);
        self.prompts.set(server, manifest.prompts);
        self.resources.set(server, manifest.resources);
        self.resource_templates.set(server, manifest.resource_templates);
    }

    pub(crate) fn record_failure(&mut self, failure: ServerFetchError) {
        self.failures.push(failure);
    }

    /// Stamp the store with the publish time.
    pub(crate) fn publish(mut self) -> Self {
        self.fetched_at = Utc::now();
        self
    }

    pub fn tools(&self) -> &ArtifactMap<Tool> {
        &self.tools
    }

    pub fn prompts(&self) -> &ArtifactMap<Prompt> {
        &self.prompts
    }

    pub fn resources(&self) -> &ArtifactMap<Resource> {
        &self.resources
    }

    pub fn resource_templates(&self) -> &ArtifactMap<ResourceTemplate> {
        &self.resource_templates
    }

    /// Server names, in registry order.
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.tools.servers()
    }

    /// Number of `kind` entries held for `server`.
    pub fn count(&self, server: &str, kind: ManifestKind) -> Option<usize> {
        match kind {
            ManifestKind::Tools => self.tools.get(server).map(<[_]>::len),
            ManifestKind::Prompts => self.prompts.get(server).map(<[_]>::len),
            ManifestKind::Resources => self.resources.get(server).map(<[_]>::len),
            ManifestKind::ResourceTemplates => {
                self.resource_templates.get(server).map(<[_]>::len)
            }
        }
    }

    /// Servers that failed under the isolating fetch policy.
    pub fn failures(&self) -> &[ServerFetchError] {
        &self.failures
    }

    /// The failure recorded for `server`, if any.
    pub fn failure(&self, server: &str) -> Option<&ServerFetchError> {
        self.failures.iter().find(|f| f.server == server)
    }

    /// When the fetch pass finished.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchStep, McpError};
    use mcpdocs_core::{Config, McpConfig, RawServerConfig};
    use serde_json::Value;

    fn registry(names: &[&str]) -> ServerRegistry {
        let mut mcp = McpConfig::new();
        for name in names {
            mcp = mcp.with_server(*name, RawServerConfig::stdio("python"));
        }
        Config {
            mcp_config: Some(mcp),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            title: None,
            description: None,
            input_schema: Value::Null,
            output_schema: None,
            annotations: None,
            meta: None,
        }
    }

    #[test]
    fn test_every_server_has_empty_entries() {
        let store = MetadataStore::for_registry(&registry(&["beta", "alpha"]));

        assert_eq!(store.servers().collect::<Vec<_>>(), vec!["alpha", "beta"]);
        assert_eq!(store.tools().len(), 2);
        assert_eq!(store.prompts().get("alpha"), Some(&[][..]));
        assert_eq!(store.resource_templates().get("beta").map(<[_]>::len), Some(0));
        assert!(store.resources().get("gamma").is_none());
        assert_eq!(store.count("gamma", ManifestKind::Tools), None);
    }

    #[test]
    fn test_record_keeps_server_order_of_entries() {
        let mut store = MetadataStore::for_registry(&registry(&["alpha", "beta"]));
        store.record(
            "alpha",
            ServerManifest {
                tools: vec![tool("zeta"), tool("alpha")],
                ..Default::default()
            },
        );

        let names: Vec<_> = store
            .tools()
            .get("alpha")
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(store.count("alpha", ManifestKind::Tools), Some(2));
        assert_eq!(store.count("beta", ManifestKind::Tools), Some(0));
        assert_eq!(store.tools().total(), 2);
    }

    #[test]
    fn test_failures_are_looked_up_by_server() {
        let mut store = MetadataStore::for_registry(&registry(&["alpha"]));
        store.record_failure(ServerFetchError::new(
            "alpha",
            FetchStep::Connect,
            McpError::protocol("nope"),
        ));

        assert_eq!(store.failures().len(), 1);
        assert!(store.failure("alpha").is_some());
        assert!(store.failure("beta").is_none());
    }

    #[test]
    fn test_publish_stamps_time() {
        let store = MetadataStore::for_registry(&registry(&["alpha"]));
        let before = store.fetched_at();
        let store = store.publish();
        assert!(store.fetched_at() >= before);
    }
}
