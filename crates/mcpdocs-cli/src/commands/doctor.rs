//! Diagnostic command to check every configured server.

use std::fmt::Write as _;

use mcpdocs_core::{Config, FetchPolicy};
use mcpdocs_mcp::{BuildMetadataOrchestrator, ManifestKind, MetadataStore};

pub fn run(mut config: Config) -> anyhow::Result<()> {
    // One broken server should not hide the others.
    config.fetch_policy = FetchPolicy::Isolate;
    let orchestrator = BuildMetadataOrchestrator::new(config);

    let (report, failed) = execute(&orchestrator)?;
    print!("{}", report);

    if failed > 0 {
        anyhow::bail!(
            "{} MCP server{} could not be fetched",
            failed,
            if failed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

/// Fetch every server and describe the result. Returns the report and the
/// number of failed servers.
pub fn execute(orchestrator: &BuildMetadataOrchestrator) -> anyhow::Result<(String, usize)> {
    let context = orchestrator
        .run_blocking()
        .map_err(mcpdocs_core::Error::from)?;
    let store = context.store();

    let mut out = String::new();
    writeln!(out, "Running diagnostics...\n")?;
    writeln!(
        out,
        "MCP servers (fetched {}):",
        store.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    for server in store.servers() {
        match store.failure(server) {
            None => writeln!(out, "  ✓ {}: {}", server, summary(store, server))?,
            Some(failure) => {
                writeln!(out, "  ✗ {}: {}", server, summary(store, server))?;
                writeln!(out, "    {}", failure)?;
            }
        }
    }

    writeln!(out, "\nDiagnostics complete.")?;
    Ok((out, store.failures().len()))
}

fn summary(store: &MetadataStore, server: &str) -> String {
    ManifestKind::ALL
        .iter()
        .map(|&kind| {
            let count = store.count(server, kind).unwrap_or(0);
            format!("{} {}", count, kind.noun(count))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpdocs_core::{McpConfig, RawServerConfig};
    use mcpdocs_mcp::testing::{ScriptedConnector, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_doctor_reports_each_server() {
        let config = Config {
            fetch_policy: FetchPolicy::Isolate,
            mcp_config: Some(
                McpConfig::new()
                    .with_server("alpha", RawServerConfig::stdio("a"))
                    .with_server("beta", RawServerConfig::stdio("b")),
            ),
            ..Default::default()
        };
        let connector = ScriptedConnector::new().with_server(
            "alpha",
            ScriptedTransport::new()
                .with_result("tools/list", json!({"tools": [{"name": "t", "inputSchema": {}}]}))
                .with_result("resources/list", json!({"resources": [
                    {"name": "a", "uri": "x://a"},
                    {"name": "b", "uri": "x://b"}
                ]})),
        );
        let orchestrator =
            BuildMetadataOrchestrator::new(config).with_connector(Arc::new(connector));

        let (report, failed) = execute(&orchestrator).unwrap();

        assert_eq!(failed, 1);
        assert!(report.contains(
            "  ✓ alpha: 1 tool, 0 prompts, 2 resources, 0 resource templates\n"
        ));
        assert!(report.contains("  ✗ beta: 0 tools"));
        assert!(report.contains("MCP server 'beta': connection failed"));
    }
}
