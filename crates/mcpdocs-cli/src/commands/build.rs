//! Build command: expand directives in a tree of Markdown documents.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{error, info};

use mcpdocs_core::Config;
use mcpdocs_mcp::{document, BuildMetadataOrchestrator};

/// What a build produced.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Documents written, relative to the output directory.
    pub written: Vec<PathBuf>,
    /// Documents whose directives failed, relative to the source.
    pub failed: Vec<PathBuf>,
}

pub fn run(config: Config, source: &Path, out: &Path) -> anyhow::Result<()> {
    let orchestrator = BuildMetadataOrchestrator::new(config);
    let report = execute(&orchestrator, source, out)?;

    println!(
        "Wrote {} document{} to {}",
        report.written.len(),
        if report.written.len() == 1 { "" } else { "s" },
        out.display()
    );

    if !report.failed.is_empty() {
        return Err(mcpdocs_core::Error::Render(format!(
            "{} document{} failed to render",
            report.failed.len(),
            if report.failed.len() == 1 { "" } else { "s" }
        ))
        .into());
    }

    Ok(())
}

/// Fetch metadata once, then expand every document under `source` into `out`.
///
/// A failing directive fails only its own document; the rest are written.
pub fn execute(
    orchestrator: &BuildMetadataOrchestrator,
    source: &Path,
    out: &Path,
) -> anyhow::Result<BuildReport> {
    let documents = collect_documents(source, out)?;
    if documents.is_empty() {
        anyhow::bail!("No Markdown documents found in {}", source.display());
    }

    let context = orchestrator
        .run_blocking()
        .map_err(mcpdocs_core::Error::from)?;

    let mut report = BuildReport::default();
    for (path, relative) in documents {
        let text = fs::read_to_string(&path).map_err(mcpdocs_core::Error::from)?;

        match document::expand(&text, context.store()) {
            Ok(rendered) => {
                let target = out.join(&relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(mcpdocs_core::Error::from)?;
                }
                fs::write(&target, rendered).map_err(mcpdocs_core::Error::from)?;
                info!(document = %relative.display(), "Rendered document");
                report.written.push(relative);
            }
            Err(e) => {
                error!(document = %relative.display(), error = %e, "Failed to render document");
                report.failed.push(relative);
            }
        }
    }

    Ok(report)
}

/// Markdown documents under `source` with their paths relative to it.
///
/// An output directory inside `source` is not descended into.
fn collect_documents(source: &Path, out: &Path) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    if source.is_file() {
        let name = source
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("Invalid document path: {}", source.display()))?;
        return Ok(vec![(source.to_path_buf(), name)]);
    }

    if !source.is_dir() {
        anyhow::bail!("Source not found: {}", source.display());
    }

    let out_dir = out.canonicalize().ok();
    let mut documents: Vec<(PathBuf, PathBuf)> = WalkBuilder::new(source)
        .hidden(false)
        .git_ignore(true)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !is_dir || out_dir.is_none() || entry.path().canonicalize().ok() != out_dir
        })
        .build()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(source).ok()?.to_path_buf();
            Some((e.path().to_path_buf(), relative))
        })
        .collect();

    documents.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(documents)
}
