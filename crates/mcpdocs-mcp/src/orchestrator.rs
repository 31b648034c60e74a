//! Build-time metadata acquisition.
//!
//! This module provides `BuildMetadataOrchestrator`, which validates the
//! configuration, fetches every server's manifest and publishes the result
//! as a read-only [`BuildContext`].

use std::sync::Arc;

use futures::future::join_all;
use mcpdocs_core::{Config, FetchPolicy, ServerConfig};
use tracing::{debug, info, warn};

use crate::client::{Connector, DefaultConnector};
use crate::error::{BuildError, ServerFetchError};
use crate::fetcher::MetadataFetcher;
use crate::manifest::ServerManifest;
use crate::store::MetadataStore;

/// Build-wide state handed to rendering.
#[derive(Debug, Clone)]
pub struct BuildContext {
    store: Arc<MetadataStore>,
}

impl BuildContext {
    /// The published store.
    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Shared handle to the published store.
    pub fn shared_store(&self) -> Arc<MetadataStore> {
        Arc::clone(&self.store)
    }
}

/// Runs the fetch pass once per build.
pub struct BuildMetadataOrchestrator {
    config: Config,
    connector: Arc<dyn Connector>,
}

type FetchOutcome<'a> = (&'a ServerConfig, ServerManifest, Result<(), ServerFetchError>);

impl BuildMetadataOrchestrator {
    /// Create an orchestrator that reaches servers over their configured transports.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connector: Arc::new(DefaultConnector),
        }
    }

    /// Replace the connector used to open transports.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// The configuration this orchestrator runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate, fetch and publish.
    ///
    /// Configuration errors are returned before any server is contacted.
    /// Under [`FetchPolicy::FailFast`] the first failing server, in registry
    /// order, fails the pass and nothing is published. Under
    /// [`FetchPolicy::Isolate`] the failure is recorded in the store and the
    /// server keeps the kinds retrieved before it failed.
    pub async fn run(&self) -> Result<BuildContext, BuildError> {
        let registry = self.config.validate()?;
        let names: Vec<&str> = registry.names().collect();

        info!(
            policy = %self.config.fetch_policy,
            concurrent = self.config.concurrent_fetch,
            "Initialising MCP client for {}: {}",
            if names.len() == 1 { "server" } else { "servers" },
            names.join(", ")
        );

        let mut store = MetadataStore::for_registry(&registry);
        let fetcher =
            MetadataFetcher::new(Arc::clone(&self.connector))
                .with_timeout(self.config.request_timeout());

        let outcomes: Vec<FetchOutcome<'_>> = if self.config.concurrent_fetch {
            join_all(registry.iter().map(|server| fetch_one(&fetcher, server))).await
        } else {
            let mut outcomes = Vec::with_capacity(registry.len());
            for server in &registry {
                let outcome = fetch_one(&fetcher, server).await;
                let failed = outcome.2.is_err();
                outcomes.push(outcome);
                if failed && self.config.fetch_policy == FetchPolicy::FailFast {
                    debug!(server = %server.name, "Stopping fetch pass after failure");
                    break;
                }
            }
            outcomes
        };

        for (server, manifest, result) in outcomes {
            match result {
                Ok(()) => store.record(&server.name, manifest),
                Err(e) => match self.config.fetch_policy {
                    FetchPolicy::FailFast => return Err(e.into()),
                    FetchPolicy::Isolate => {
                        warn!(
                            server = %server.name,
                            step = %e.step,
                            error = %e.source,
                            "MCP server fetch failed, continuing"
                        );
                        store.record(&server.name, manifest);
                        store.record_failure(e);
                    }
                },
            }
        }

        let store = store.publish();
        info!(
            servers = registry.len(),
            tools = store.tools().total(),
            prompts = store.prompts().total(),
            resources = store.resources().total(),
            resource_templates = store.resource_templates().total(),
            failed = store.failures().len(),
            "MCP metadata published"
        );

        Ok(BuildContext {
            store: Arc::new(store),
        })
    }

    /// Run the pass to completion on a fresh runtime.
    ///
    /// Must not be called from within an async context.
    pub fn run_blocking(&self) -> Result<BuildContext, BuildError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(BuildError::Runtime)?;
        runtime.block_on(self.run())
    }
}

async fn fetch_one<'a>(fetcher: &MetadataFetcher, server: &'a ServerConfig) -> FetchOutcome<'a> {
    let mut manifest = ServerManifest::default();
    let result = fetcher.fetch(server, &mut manifest).await;
    (server, manifest, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchStep;
    use crate::manifest::ManifestKind;
    use crate::testing::{ScriptedConnector, ScriptedTransport};
    use mcpdocs_core::{ConfigurationError, McpConfig, RawServerConfig};
    use serde_json::json;

    fn config(servers: &[&str], policy: FetchPolicy, concurrent: bool) -> Config {
        let mut mcp = McpConfig::new();
        for name in servers {
            mcp = mcp.with_server(*name, RawServerConfig::stdio("python"));
        }
        Config {
            fetch_policy: policy,
            concurrent_fetch: concurrent,
            mcp_config: Some(mcp),
            ..Default::default()
        }
    }

    fn failing_alpha() -> ScriptedTransport {
        ScriptedTransport::new()
            .with_result("tools/list", json!({"tools": [{"name": "t", "inputSchema": {}}]}))
            .with_error("prompts/list", -32603, "down")
    }

    fn healthy_beta() -> ScriptedTransport {
        ScriptedTransport::new()
            .with_result("tools/list", json!({"tools": [{"name": "b1", "inputSchema": {}}]}))
            .with_result("prompts/list", json!({"prompts": [{"name": "bp"}]}))
    }

    #[tokio::test]
    async fn test_configuration_error_contacts_no_server() {
        let connector =
            Arc::new(ScriptedConnector::new().with_server("a", ScriptedTransport::new()));
        let orchestrator =
            BuildMetadataOrchestrator::new(config(&[], FetchPolicy::FailFast, true))
                .with_connector(connector.clone());

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(
            err,
            BuildError::Configuration(ConfigurationError::EmptyServerList)
        ));
        assert!(connector.transcript("a").unwrap().requests().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_publishes_nothing() {
        for concurrent in [true, false] {
            let connector = ScriptedConnector::new()
                .with_server("alpha", failing_alpha())
                .with_server("beta", healthy_beta());
            let orchestrator = BuildMetadataOrchestrator::new(config(
                &["alpha", "beta"],
                FetchPolicy::FailFast,
                concurrent,
            ))
            .with_connector(Arc::new(connector));

            match orchestrator.run().await {
                Err(BuildError::Fetch(e)) => {
                    assert_eq!(e.server, "alpha");
                    assert_eq!(e.step, FetchStep::Retrieve(ManifestKind::Prompts));
                }
                other => panic!("expected fetch error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[tokio::test]
    async fn test_sequential_fail_fast_stops_visiting() {
        let connector = Arc::new(
            ScriptedConnector::new()
                .with_server("alpha", failing_alpha())
                .with_server("beta", healthy_beta()),
        );
        let orchestrator =
            BuildMetadataOrchestrator::new(config(&["alpha", "beta"], FetchPolicy::FailFast, false))
                .with_connector(connector.clone());

        assert!(orchestrator.run().await.is_err());
        assert!(connector.transcript("beta").unwrap().requests().is_empty());
    }

    #[tokio::test]
    async fn test_isolate_keeps_partial_results() {
        for concurrent in [true, false] {
            let connector = ScriptedConnector::new()
                .with_server("alpha", failing_alpha())
                .with_server("beta", healthy_beta());
            let orchestrator = BuildMetadataOrchestrator::new(config(
                &["alpha", "beta"],
                FetchPolicy::Isolate,
                concurrent,
            ))
            .with_connector(Arc::new(connector));

            let context = orchestrator.run().await.unwrap();
            let store = context.store();

            assert_eq!(store.count("alpha", ManifestKind::Tools), Some(1));
            assert_eq!(store.count("alpha", ManifestKind::Prompts), Some(0));
            assert_eq!(store.count("alpha", ManifestKind::Resources), Some(0));
            assert_eq!(store.count("alpha", ManifestKind::ResourceTemplates), Some(0));
            assert_eq!(store.count("beta", ManifestKind::Tools), Some(1));
            assert_eq!(store.count("beta", ManifestKind::Prompts), Some(1));

            assert_eq!(store.failures().len(), 1);
            let failure = store.failure("alpha").unwrap();
            assert_eq!(failure.step, FetchStep::Retrieve(ManifestKind::Prompts));
        }
    }

    #[test]
    fn test_run_blocking() {
        let connector = ScriptedConnector::new().with_server("solo", healthy_beta());
        let orchestrator =
            BuildMetadataOrchestrator::new(config(&["solo"], FetchPolicy::FailFast, true))
                .with_connector(Arc::new(connector));

        let context = orchestrator.run_blocking().unwrap();
        assert_eq!(context.store().servers().collect::<Vec<_>>(), vec!["solo"]);
        assert_eq!(Arc::strong_count(&context.shared_store()), 2);
    }
}
