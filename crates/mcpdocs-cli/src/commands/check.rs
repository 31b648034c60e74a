//! Check command: validate configuration offline.

use std::fmt::Write as _;

use mcpdocs_core::config::SERVERS_KEY;
use mcpdocs_core::Config;

pub fn run(config: &Config, show: bool) -> anyhow::Result<()> {
    print!("{}", report(config, show)?);
    Ok(())
}

/// Describe the validated configuration, optionally with its TOML form.
pub fn report(config: &Config, show: bool) -> anyhow::Result<String> {
    let registry = config.validate().map_err(mcpdocs_core::Error::from)?;

    let mut out = String::new();
    writeln!(
        out,
        "Configuration OK: {} server{} in mcp_config.{}",
        registry.len(),
        if registry.len() == 1 { "" } else { "s" },
        SERVERS_KEY
    )?;
    for server in &registry {
        writeln!(out, "  ✓ {} ({})", server.name, server.transport)?;
    }
    writeln!(
        out,
        "\nFetch policy: {}, concurrent: {}, request timeout: {}s",
        config.fetch_policy, config.concurrent_fetch, config.request_timeout_secs
    )?;

    if show {
        let effective = toml::to_string_pretty(&redacted(config))?;
        writeln!(out, "\n{}", effective.trim_end())?;
    }

    Ok(out)
}

/// A copy of `config` with bearer tokens masked.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if let Some(servers) = config
        .mcp_config
        .as_mut()
        .and_then(|mcp| mcp.servers.as_mut())
    {
        for server in servers.values_mut() {
            if let Some(token) = server.bearer_token.as_mut() {
                *token = "********".to_string();
            }
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpdocs_core::{ConfigurationError, McpConfig, RawServerConfig};

    fn config() -> Config {
        Config {
            mcp_config: Some(
                McpConfig::new()
                    .with_server(
                        "pymcp",
                        RawServerConfig::stdio("python")
                            .with_args(vec!["-m".into(), "pymcp".into()]),
                    )
                    .with_server(
                        "remote",
                        RawServerConfig::http("https://mcp.example.com/mcp")
                            .with_bearer_token("s3cret"),
                    ),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_lists_servers() {
        let out = report(&config(), false).unwrap();
        assert!(out.starts_with("Configuration OK: 2 servers in mcp_config.mcpServers\n"));
        assert!(out.contains("  ✓ pymcp (stdio: python -m pymcp)\n"));
        assert!(out.contains("  ✓ remote (http: https://mcp.example.com/mcp)\n"));
        assert!(out.contains("Fetch policy: fail-fast, concurrent: true, request timeout: 30s"));
    }

    #[test]
    fn test_show_masks_tokens() {
        let out = report(&config(), true).unwrap();
        assert!(out.contains("mcpServers"));
        assert!(out.contains("https://mcp.example.com/mcp"));
        assert!(out.contains("********"));
        assert!(!out.contains("s3cret"));

        // The printed TOML loads back to the same servers.
        let toml_part = &out[out.find("allow_only_one_mcp_server").unwrap()..];
        let reloaded = Config::from_toml_str(toml_part).unwrap();
        assert_eq!(reloaded.validate().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = report(&Config::default(), false).unwrap_err();
        let err = err.downcast::<mcpdocs_core::Error>().unwrap();
        assert!(matches!(
            err,
            mcpdocs_core::Error::Configuration(ConfigurationError::MissingConfig)
        ));
    }
}
