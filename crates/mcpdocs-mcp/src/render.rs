//! Markdown rendering of directive results.
//!
//! Entries become an enumerated list. Each item starts with the bold display
//! name and an emphasised description, followed by JSON blocks marked with:
//!
//! - `↳` tool input schema, or prompt arguments
//! - `↲` tool output schema
//! - `※` annotations
//! - `☰` server metadata

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use crate::directives::{self, DirectiveArgs, Entry};
use crate::error::UnknownServerError;
use crate::manifest::ManifestKind;
use crate::protocol::{Prompt, Resource, ResourceTemplate, Tool};
use crate::store::MetadataStore;

const INPUT_MARK: &str = "↳";
const OUTPUT_MARK: &str = "↲";
const ANNOTATIONS_MARK: &str = "※";
const META_MARK: &str = "☰";

/// A descriptor that can be laid out as one list item.
pub trait RenderMarkdown {
    /// Text after the bold name on the first line, e.g. a URI.
    fn headline_suffix(&self) -> Option<String> {
        None
    }

    /// Description shown in emphasis.
    fn description(&self) -> Option<&str>;

    /// Marked JSON blocks shown under the headline.
    fn blocks(&self) -> Vec<(&'static str, String)>;
}

impl RenderMarkdown for Tool {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn blocks(&self) -> Vec<(&'static str, String)> {
        let mut blocks = vec![(INPUT_MARK, pretty(&self.input_schema))];
        if let Some(ref schema) = self.output_schema {
            blocks.push((OUTPUT_MARK, pretty(schema)));
        }
        push_common(&mut blocks, self.annotations.as_ref(), self.meta.as_ref());
        blocks
    }
}

impl RenderMarkdown for Prompt {
    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn blocks(&self) -> Vec<(&'static str, String)> {
        let mut blocks = Vec::new();
        if let Some(ref arguments) = self.arguments {
            if !arguments.is_empty() {
                blocks.push((INPUT_MARK, pretty(arguments)));
            }
        }
        push_common(&mut blocks, None, self.meta.as_ref());
        blocks
    }
}

impl RenderMarkdown for Resource {
    fn headline_suffix(&self) -> Option<String> {
        Some(location(&self.uri, self.mime_type.as_deref()))
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn blocks(&self) -> Vec<(&'static str, String)> {
        let mut blocks = Vec::new();
        push_common(&mut blocks, self.annotations.as_ref(), self.meta.as_ref());
        blocks
    }
}

impl RenderMarkdown for ResourceTemplate {
    fn headline_suffix(&self) -> Option<String> {
        Some(location(&self.uri_template, self.mime_type.as_deref()))
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn blocks(&self) -> Vec<(&'static str, String)> {
        let mut blocks = Vec::new();
        push_common(&mut blocks, self.annotations.as_ref(), self.meta.as_ref());
        blocks
    }
}

fn push_common(
    blocks: &mut Vec<(&'static str, String)>,
    annotations: Option<&Value>,
    meta: Option<&Value>,
) {
    if let Some(annotations) = annotations {
        blocks.push((ANNOTATIONS_MARK, pretty(annotations)));
    }
    if let Some(meta) = meta {
        blocks.push((META_MARK, pretty(meta)));
    }
}

fn location(uri: &str, mime_type: Option<&str>) -> String {
    match mime_type {
        Some(mime) => format!(" ({}) [{}]", uri, mime),
        None => format!(" ({})", uri),
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Render entries as a Markdown enumerated list.
///
/// No entries render as an empty string.
pub fn render_list<T: RenderMarkdown>(entries: &[Entry<'_, T>]) -> String {
    let mut out = String::new();

    for (index, entry) in entries.iter().enumerate() {
        let marker = format!("{}. ", index + 1);
        let indent = " ".repeat(marker.len());
        let descriptor = entry.descriptor;

        let _ = write!(out, "{}**{}**", marker, entry.display_name);
        if let Some(suffix) = descriptor.headline_suffix() {
            out.push_str(&suffix);
        }
        if let Some(description) = descriptor.description() {
            let _ = write!(out, ": *{}*", description);
        }
        out.push('\n');

        for (mark, json) in descriptor.blocks() {
            let _ = writeln!(out, "\n{}{}\n", indent, mark);
            let _ = writeln!(out, "{}```json", indent);
            for line in json.lines() {
                let _ = writeln!(out, "{}{}", indent, line);
            }
            let _ = writeln!(out, "{}```", indent);
        }

        out.push('\n');
    }

    out
}

/// Run the directive for `kind` and render its entries.
pub fn render_kind(
    store: &MetadataStore,
    kind: ManifestKind,
    args: &DirectiveArgs,
) -> Result<String, UnknownServerError> {
    let rendered = match kind {
        ManifestKind::Tools => render_list(&directives::tools(store, args)?),
        ManifestKind::Prompts => render_list(&directives::prompts(store, args)?),
        ManifestKind::Resources => render_list(&directives::resources(store, args)?),
        ManifestKind::ResourceTemplates => {
            render_list(&directives::resource_templates(store, args)?)
        }
    };
    Ok(rendered)
}
