//! End-to-end tests of the fetch pass and directive rendering.

use std::sync::Arc;
use std::time::Duration;

use mcpdocs_core::{Config, FetchPolicy, McpConfig, RawServerConfig};
use mcpdocs_mcp::testing::{ScriptedConnector, ScriptedTransport};
use mcpdocs_mcp::{
    directives, document, BuildError, BuildMetadataOrchestrator, DirectiveArgs, FetchStep,
    ManifestKind, McpError,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

fn config(servers: &[&str]) -> Config {
    let mut mcp = McpConfig::new();
    for name in servers {
        let raw = RawServerConfig::stdio("python")
            .with_args(vec!["-m".into(), format!("{}.server", name)]);
        mcp = mcp.with_server(*name, raw);
    }
    Config {
        mcp_config: Some(mcp),
        ..Default::default()
    }
}

/// alpha has two tools and nothing else; beta has one prompt and one resource.
fn alpha_beta() -> ScriptedConnector {
    ScriptedConnector::new()
        .with_server(
            "alpha",
            ScriptedTransport::new().with_result(
                "tools/list",
                json!({"tools": [
                    {"name": "t1", "description": "First", "inputSchema": {"type": "object"}},
                    {"name": "t2", "inputSchema": {"type": "object"}}
                ]}),
            ),
        )
        .with_server(
            "beta",
            ScriptedTransport::new()
                .with_result("prompts/list", json!({"prompts": [{"name": "p1"}]}))
                .with_result(
                    "resources/list",
                    json!({"resources": [
                        {"name": "r1", "uri": "mem://r1", "mimeType": "text/plain"}
                    ]}),
                ),
        )
}

#[tokio::test]
async fn test_alpha_beta_end_to_end() {
    let orchestrator =
        BuildMetadataOrchestrator::new(config(&["alpha", "beta"]))
            .with_connector(Arc::new(alpha_beta()));
    let context = orchestrator.run().await.unwrap();
    let store = context.store();

    // Every configured server is a key of every kind.
    for kind in ManifestKind::ALL {
        assert!(store.count("alpha", kind).is_some(), "{kind}");
        assert!(store.count("beta", kind).is_some(), "{kind}");
    }
    assert_eq!(store.tools().len(), 2);
    assert_eq!(store.tools().get("alpha").unwrap().len(), 2);
    assert!(store.tools().get("beta").unwrap().is_empty());
    assert_eq!(store.prompts().get("beta").unwrap()[0].name, "p1");
    assert!(store.failures().is_empty());

    let all = directives::tools(store, &DirectiveArgs::new()).unwrap();
    let names: Vec<_> = all.iter().map(|e| e.display_name.as_str()).collect();
    assert_eq!(names, vec!["alpha::t1", "alpha::t2"]);

    let beta = directives::prompts(store, &DirectiveArgs::for_server("beta")).unwrap();
    assert_eq!(beta.len(), 1);
    assert_eq!(beta[0].display_name, "p1");

    let err = directives::resources(store, &DirectiveArgs::for_server("gamma")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "No MCP server specification exists by the name 'gamma'."
    );
}

#[tokio::test]
async fn test_document_expansion_after_build() {
    let orchestrator =
        BuildMetadataOrchestrator::new(config(&["alpha", "beta"]))
            .with_connector(Arc::new(alpha_beta()));
    let context = orchestrator.run().await.unwrap();

    let source = "# Reference\n\n```{mcpdocs:tools}\n```\n\n```{mcpdocs:resources} beta\n```\n";
    let out = document::expand(source, context.store()).unwrap();

    assert!(out.contains("1. **alpha::t1**: *First*\n"));
    assert!(out.contains("2. **alpha::t2**\n"));
    assert!(out.contains("1. **r1** (mem://r1) [text/plain]\n"));
}

#[tokio::test]
async fn test_fail_fast_on_alpha_prompts() {
    let connector = ScriptedConnector::new()
        .with_server(
            "alpha",
            ScriptedTransport::new()
                .with_result("tools/list", json!({"tools": [{"name": "t1", "inputSchema": {}}]}))
                .with_error("prompts/list", -32000, "prompts unavailable"),
        )
        .with_server("beta", ScriptedTransport::new());
    let connector = Arc::new(connector);

    let orchestrator = BuildMetadataOrchestrator::new(config(&["alpha", "beta"]))
        .with_connector(connector.clone());

    let err = match orchestrator.run().await {
        Err(BuildError::Fetch(err)) => err,
        Err(other) => panic!("expected fetch error, got {other}"),
        Ok(_) => panic!("expected fetch error"),
    };
    assert_eq!(err.server, "alpha");
    assert_eq!(err.step, FetchStep::Retrieve(ManifestKind::Prompts));
    assert!(err.to_string().contains("prompts unavailable"));
    assert!(connector.transcript("alpha").unwrap().closed());
}

#[tokio::test]
async fn test_isolate_on_alpha_prompts() {
    let connector = ScriptedConnector::new()
        .with_server(
            "alpha",
            ScriptedTransport::new()
                .with_result("tools/list", json!({"tools": [{"name": "t1", "inputSchema": {}}]}))
                .with_disconnect("prompts/list"),
        )
        .with_server(
            "beta",
            ScriptedTransport::new()
                .with_result("tools/list", json!({"tools": [{"name": "b", "inputSchema": {}}]})),
        );

    let mut config = config(&["alpha", "beta"]);
    config.fetch_policy = FetchPolicy::Isolate;

    let context = BuildMetadataOrchestrator::new(config)
        .with_connector(Arc::new(connector))
        .run()
        .await
        .unwrap();
    let store = context.store();

    assert_eq!(store.tools().get("alpha").unwrap()[0].name, "t1");
    assert!(store.prompts().get("alpha").unwrap().is_empty());
    assert!(store.resources().get("alpha").unwrap().is_empty());
    assert_eq!(store.tools().get("beta").unwrap().len(), 1);

    let failure = store.failure("alpha").unwrap();
    assert_eq!(failure.step, FetchStep::Retrieve(ManifestKind::Prompts));
    assert!(matches!(failure.source, McpError::Transport(_)));

    // An isolated server is still a known server for directives.
    assert!(directives::prompts(store, &DirectiveArgs::for_server("alpha"))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_timeout_and_pagination_through_orchestrator() {
    let connector = ScriptedConnector::new()
        .with_server(
            "paged",
            ScriptedTransport::new()
                .with_result(
                    "resources/templates/list",
                    json!({
                        "resourceTemplates": [{"name": "a", "uriTemplate": "x://{a}"}],
                        "nextCursor": "c1"
                    }),
                )
                .with_result(
                    "resources/templates/list",
                    json!({"resourceTemplates": [{"name": "b", "uriTemplate": "x://{b}"}]}),
                ),
        )
        .with_server(
            "slow",
            ScriptedTransport::new().with_delay("tools/list", Duration::from_secs(3)),
        );

    let mut config = config(&["paged", "slow"]);
    config.fetch_policy = FetchPolicy::Isolate;
    config.request_timeout_secs = 1;

    let context = BuildMetadataOrchestrator::new(config)
        .with_connector(Arc::new(connector))
        .run()
        .await
        .unwrap();
    let store = context.store();

    let templates: Vec<_> = store
        .resource_templates()
        .get("paged")
        .unwrap()
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(templates, vec!["a", "b"]);

    let failure = store.failure("slow").unwrap();
    assert_eq!(failure.step, FetchStep::Retrieve(ManifestKind::Tools));
    assert!(failure.source.is_timeout());
}

/// Serve an HTTP MCP endpoint that completes `initialize` and then never
/// answers another POST. Returns the endpoint URL.
async fn stalling_http_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_until_stalled(stream));
        }
    });
    format!("http://{}/mcp", addr)
}

async fn serve_until_stalled(stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }
        let request: Value = serde_json::from_slice(&body).unwrap_or_default();
        if request["method"] != "initialize" {
            std::future::pending::<()>().await;
        }

        let reply = json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "result": {
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "stall", "version": "0.0.0"}
            }
        })
        .to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
            reply.len(),
            reply
        );
        if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn test_stalled_http_server_fails_the_pass_within_timeout() {
    let url = stalling_http_server().await;
    let config = Config {
        request_timeout_secs: 1,
        mcp_config: Some(McpConfig::new().with_server("stall", RawServerConfig::http(url))),
        ..Default::default()
    };

    let orchestrator = BuildMetadataOrchestrator::new(config);
    let run = orchestrator.run();
    let result = tokio::time::timeout(Duration::from_secs(8), run)
        .await
        .expect("fetch pass finishes once the request timeout expires");

    let err = match result {
        Err(BuildError::Fetch(err)) => err,
        Err(other) => panic!("expected fetch error, got {other}"),
        Ok(_) => panic!("expected fetch error"),
    };
    assert_eq!(err.server, "stall");
    assert_eq!(err.step, FetchStep::Connect);
    assert!(err.source.is_timeout());
}
