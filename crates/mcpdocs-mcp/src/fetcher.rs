//! Retrieval of one server's manifest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mcpdocs_core::ServerConfig;
use tracing::{debug, info, warn};

use crate::client::{Connector, McpConnection, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{FetchStep, McpError, ServerFetchError};
use crate::manifest::{Descriptor, ManifestKind, ServerManifest};
use crate::protocol::{
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, Page,
};

/// Fetches the four manifest kinds from a server over one session.
#[derive(Clone)]
pub struct MetadataFetcher {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl MetadataFetcher {
    /// Create a fetcher that opens transports through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch `server`'s manifest into `manifest`.
    ///
    /// Kinds are retrieved in the order of [`ManifestKind::ALL`]. On failure
    /// the remaining kinds are skipped while the ones already retrieved stay
    /// in `manifest`. The session is closed on every path.
    pub async fn fetch(
        &self,
        server: &ServerConfig,
        manifest: &mut ServerManifest,
    ) -> Result<(), ServerFetchError> {
        let name = server.name.as_str();

        let transport = self
            .connector
            .connect(server)
            .await
            .map_err(|e| ServerFetchError::new(name, FetchStep::Connect, e.into()))?;

        let connection = McpConnection::new(name, transport).with_timeout(self.timeout);

        let result = match connection.initialize().await {
            Ok(_) => self.retrieve_all(&connection, manifest).await,
            Err(e) => Err(ServerFetchError::new(name, FetchStep::Connect, e)),
        };

        if let Err(e) = connection.close().await {
            warn!(server = %name, error = %e, "Failed to close MCP session");
        }

        result
    }

    async fn retrieve_all(
        &self,
        connection: &McpConnection,
        manifest: &mut ServerManifest,
    ) -> Result<(), ServerFetchError> {
        for kind in ManifestKind::ALL {
            if !connection.supports(kind).await {
                debug!(
                    server = %connection.name(),
                    kind = %kind,
                    "Server does not offer this kind, skipping"
                );
                continue;
            }

            info!(server = %connection.name(), "Fetching MCP {}", kind);

            match kind {
                ManifestKind::Tools => {
                    manifest.tools = retrieve::<ListToolsResult>(connection, kind).await?
                }
                ManifestKind::Prompts => {
                    manifest.prompts = retrieve::<ListPromptsResult>(connection, kind).await?
                }
                ManifestKind::Resources => {
                    manifest.resources = retrieve::<ListResourcesResult>(connection, kind).await?
                }
                ManifestKind::ResourceTemplates => {
                    manifest.resource_templates =
                        retrieve::<ListResourceTemplatesResult>(connection, kind).await?
                }
            }

            let count = manifest.count(kind);
            info!(
                server = %connection.name(),
                count = count,
                "Retrieved {} {}",
                count,
                kind.noun(count)
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for MetadataFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn retrieve<R>(
    connection: &McpConnection,
    kind: ManifestKind,
) -> Result<Vec<R::Item>, ServerFetchError>
where
    R: Page,
    R::Item: Descriptor,
{
    let step = FetchStep::Retrieve(kind);
    let items = connection
        .list_all::<R>(kind)
        .await
        .map_err(|e| ServerFetchError::new(connection.name(), step, e))?;

    check_names(&items).map_err(|e| ServerFetchError::new(connection.name(), step, e))?;
    Ok(items)
}

/// Entry names must be non-empty and unique within one kind.
fn check_names<T: Descriptor>(items: &[T]) -> Result<(), McpError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        let name = item.name();
        if name.is_empty() {
            return Err(McpError::protocol(format!(
                "{} entry with an empty name",
                T::KIND.noun(1)
            )));
        }
        if !seen.insert(name) {
            return Err(McpError::protocol(format!(
                "duplicate {} name '{}'",
                T::KIND.noun(1),
                name
            )));
        }
    }
    Ok(())
}
