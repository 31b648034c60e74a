//! Render command: print one directive's output.

use mcpdocs_core::Config;
use mcpdocs_mcp::render::render_kind;
use mcpdocs_mcp::{BuildMetadataOrchestrator, DirectiveArgs, ManifestKind};

pub fn run(
    config: Config,
    kind: ManifestKind,
    server: Option<String>,
    prefix: Option<String>,
) -> anyhow::Result<()> {
    let orchestrator = BuildMetadataOrchestrator::new(config);
    let args = DirectiveArgs { server, prefix };
    print!("{}", execute(&orchestrator, kind, &args)?);
    Ok(())
}

pub fn execute(
    orchestrator: &BuildMetadataOrchestrator,
    kind: ManifestKind,
    args: &DirectiveArgs,
) -> anyhow::Result<String> {
    let context = orchestrator
        .run_blocking()
        .map_err(mcpdocs_core::Error::from)?;
    let rendered = render_kind(context.store(), kind, args).map_err(mcpdocs_core::Error::from)?;
    Ok(rendered)
}
