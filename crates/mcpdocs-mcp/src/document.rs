//! Directive expansion in Markdown documents.
//!
//! A directive is a fenced block whose info string names one of the four
//! manifest kinds, optionally followed by a server name:
//!
//! ````markdown
//! ```{mcpdocs:tools} alpha
//! :prefix: get_
//! ```
//! ````
//!
//! The block is replaced by the rendered entries. Ordinary fenced code,
//! backtick or tilde, is copied through untouched up to a closing fence of
//! the same marker and at least the same length.

use crate::directives::DirectiveArgs;
use crate::error::RenderError;
use crate::manifest::ManifestKind;
use crate::render::render_kind;
use crate::store::MetadataStore;

const DIRECTIVE_OPEN: &str = "```{mcpdocs:";

/// Opening fence of a code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    /// Fence opened by `line`, if any. Up to three spaces of indent are allowed.
    fn open(line: &str) -> Option<Self> {
        let rest = line.trim_start_matches(' ');
        if line.len() - rest.len() > 3 {
            return None;
        }

        let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = rest.chars().take_while(|c| *c == marker).count();
        if len < 3 {
            return None;
        }

        // A backtick info string may not itself contain backticks.
        if marker == '`' && rest[len..].contains('`') {
            return None;
        }

        Some(Self { marker, len })
    }

    /// Whether `line` closes a block opened by this fence.
    fn closed_by(&self, line: &str) -> bool {
        let rest = line.trim();
        let len = rest.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && len == rest.chars().count()
    }
}

const DIRECTIVE_FENCE: Fence = Fence {
    marker: '`',
    len: 3,
};

/// A parsed directive block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Kind of entries to list.
    pub kind: ManifestKind,
    /// Server and prefix filters.
    pub args: DirectiveArgs,
    /// 1-based line of the opening fence.
    pub line: usize,
}

/// Parse every directive in `source`, in document order.
pub fn parse(source: &str) -> Result<Vec<Directive>, RenderError> {
    let mut directives = Vec::new();
    for segment in segments(source)? {
        if let Segment::Directive(directive) = segment {
            directives.push(directive);
        }
    }
    Ok(directives)
}

/// Replace every directive in `source` with its rendered entries.
///
/// The first failing directive fails the whole document.
pub fn expand(source: &str, store: &MetadataStore) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len());

    for segment in segments(source)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Directive(directive) => {
                let rendered = render_kind(store, directive.kind, &directive.args).map_err(
                    |source| RenderError::UnknownServer {
                        line: directive.line,
                        source,
                    },
                )?;
                out.push_str(&rendered);
            }
        }
    }

    Ok(out)
}

enum Segment<'a> {
    Text(&'a str),
    Directive(Directive),
}

fn segments(source: &str) -> Result<Vec<Segment<'_>>, RenderError> {
    let mut segments = Vec::new();
    let mut lines = source.split_inclusive('\n').enumerate();
    let mut code: Option<Fence> = None;

    while let Some((index, raw)) = lines.next() {
        let line = raw.trim_end();

        if let Some(fence) = code {
            if fence.closed_by(line) {
                code = None;
            }
            segments.push(Segment::Text(raw));
            continue;
        }

        if !line.starts_with(DIRECTIVE_OPEN) {
            code = Fence::open(line);
            segments.push(Segment::Text(raw));
            continue;
        }

        let line_no = index + 1;
        let (kind, server) = parse_opening(line, line_no)?;
        let mut args = DirectiveArgs {
            server,
            prefix: None,
        };

        let mut closed = false;
        for (body_index, body_raw) in lines.by_ref() {
            let body = body_raw.trim();
            if DIRECTIVE_FENCE.closed_by(body) {
                closed = true;
                break;
            }
            parse_option(body, body_index + 1, &mut args)?;
        }

        if !closed {
            return Err(RenderError::Malformed {
                line: line_no,
                message: "directive block is never closed".to_string(),
            });
        }

        segments.push(Segment::Directive(Directive {
            kind,
            args,
            line: line_no,
        }));
    }

    Ok(segments)
}

fn parse_opening(
    line: &str,
    line_no: usize,
) -> Result<(ManifestKind, Option<String>), RenderError> {
    let rest = &line[DIRECTIVE_OPEN.len()..];
    let (name, argument) = rest.split_once('}').ok_or_else(|| RenderError::Malformed {
        line: line_no,
        message: "missing '}' after directive name".to_string(),
    })?;

    let kind = ManifestKind::from_directive_name(name).ok_or_else(|| {
        RenderError::UnknownDirective {
            line: line_no,
            name: name.to_string(),
        }
    })?;

    let mut words = argument.split_whitespace();
    let server = words.next().map(str::to_string);
    if words.next().is_some() {
        return Err(RenderError::Malformed {
            line: line_no,
            message: "directives take at most one server name".to_string(),
        });
    }

    Ok((kind, server))
}

fn parse_option(body: &str, line_no: usize, args: &mut DirectiveArgs) -> Result<(), RenderError> {
    if body.is_empty() {
        return Ok(());
    }

    let malformed = |message: String| RenderError::Malformed {
        line: line_no,
        message,
    };

    let option = body
        .strip_prefix(':')
        .and_then(|rest| rest.split_once(':'))
        .ok_or_else(|| malformed(format!("expected an option line, found '{}'", body)))?;

    match option {
        ("prefix", value) if !value.trim().is_empty() => {
            args.prefix = Some(value.trim().to_string());
            Ok(())
        }
        ("prefix", _) => Err(malformed("option 'prefix' needs a value".to_string())),
        (other, _) => Err(malformed(format!("unknown option '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ServerManifest;
    use mcpdocs_core::{Config, McpConfig, RawServerConfig};
    use serde_json::json;

    fn store() -> MetadataStore {
        let registry = Config {
            mcp_config: Some(
                McpConfig::new()
                    .with_server("alpha", RawServerConfig::stdio("a"))
                    .with_server("beta", RawServerConfig::stdio("b")),
            ),
            ..Default::default()
        }
        .validate()
        .unwrap();

        let mut store = MetadataStore::for_registry(&registry);
        store.record(
            "alpha",
            ServerManifest {
                tools: serde_json::from_value(json!([
                    {"name": "get_time", "inputSchema": {}},
                    {"name": "echo", "inputSchema": {}}
                ]))
                .unwrap(),
                ..Default::default()
            },
        );
        store
    }

    #[test]
    fn test_parse_directives() {
        let source = concat!(
            "# Tools\n\n",
            "```{mcpdocs:tools} alpha\n:prefix: get_\n```\n\n",
            "```{mcpdocs:resource_templates}\n```\n",
        );
        let directives = parse(source).unwrap();

        assert_eq!(directives.len(), 2);
        assert_eq!(directives[0].kind, ManifestKind::Tools);
        assert_eq!(directives[0].line, 3);
        assert_eq!(
            directives[0].args,
            DirectiveArgs::for_server("alpha").with_prefix("get_")
        );
        assert_eq!(directives[1].kind, ManifestKind::ResourceTemplates);
        assert_eq!(directives[1].args, DirectiveArgs::new());
    }

    #[test]
    fn test_expand_replaces_blocks_and_keeps_text() {
        let source = "Intro\n\n```{mcpdocs:tools} alpha\n:prefix: get_\n```\nOutro\n";
        let out = expand(source, &store()).unwrap();

        assert!(out.starts_with("Intro\n\n1. **get_time**\n"));
        assert!(!out.contains("echo"));
        assert!(out.ends_with("Outro\n"));
        assert!(!out.contains("mcpdocs:tools"));
    }

    #[test]
    fn test_code_fences_are_not_expanded() {
        let source = "```markdown\n```{mcpdocs:tools}\n```\n";
        assert!(parse(source).unwrap().is_empty());
        assert_eq!(expand(source, &store()).unwrap(), source);
    }

    #[test]
    fn test_longer_and_tilde_fences_hide_directives() {
        let source = concat!(
            "````markdown\n",
            "```{mcpdocs:tools}\n",
            "```\n",
            "````\n",
            "~~~\n",
            "```{mcpdocs:prompts}\n",
            "```\n",
            "~~~\n",
            "```{mcpdocs:tools} alpha\n",
            "```\n",
        );
        let directives = parse(source).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].line, 9);

        let out = expand(source, &store()).unwrap();
        assert!(out.starts_with("````markdown\n```{mcpdocs:tools}\n```\n````\n~~~\n"));
        assert!(out.contains("~~~\n1. **get_time**\n"));
        assert!(out.contains("2. **echo**\n"));
        assert!(!out.contains("{mcpdocs:tools} alpha"));
    }

    #[test]
    fn test_fence_rules() {
        assert_eq!(Fence::open("````rust"), Some(Fence { marker: '`', len: 4 }));
        assert_eq!(Fence::open("   ~~~"), Some(Fence { marker: '~', len: 3 }));
        assert_eq!(Fence::open("    ```"), None);
        assert_eq!(Fence::open("``"), None);
        assert_eq!(Fence::open("``` a`b"), None);

        let fence = Fence { marker: '`', len: 4 };
        assert!(!fence.closed_by("```"));
        assert!(fence.closed_by("`````"));
        assert!(!fence.closed_by("~~~~"));
        assert!(!fence.closed_by("```` x"));
    }

    #[test]
    fn test_unknown_server_fails_document() {
        let source = "text\n```{mcpdocs:prompts} gamma\n```\n";
        let err = expand(source, &store()).unwrap_err();
        assert!(matches!(err, RenderError::UnknownServer { line: 2, .. }));
        assert_eq!(
            err.to_string(),
            "line 2: No MCP server specification exists by the name 'gamma'."
        );
    }

    #[test]
    fn test_malformed_blocks() {
        assert!(matches!(
            parse("```{mcpdocs:widgets}\n```\n"),
            Err(RenderError::UnknownDirective { line: 1, ref name }) if name == "widgets"
        ));
        assert!(matches!(
            parse("```{mcpdocs:tools} a b\n```\n"),
            Err(RenderError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            parse("```{mcpdocs:tools}\n:server: a\n```\n"),
            Err(RenderError::Malformed { line: 2, .. })
        ));
        assert!(matches!(
            parse("\n```{mcpdocs:tools}\n:prefix: x\n"),
            Err(RenderError::Malformed { line: 2, .. })
        ));
    }
}
