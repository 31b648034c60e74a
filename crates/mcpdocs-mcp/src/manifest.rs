//! Manifest kinds and the per-server manifest.

use std::fmt;

use crate::protocol::{Prompt, Resource, ResourceTemplate, Tool};

/// One of the four descriptor categories a server publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Tools,
    Prompts,
    Resources,
    ResourceTemplates,
}

impl ManifestKind {
    /// All kinds, in retrieval order.
    pub const ALL: [ManifestKind; 4] = [
        ManifestKind::Tools,
        ManifestKind::Prompts,
        ManifestKind::Resources,
        ManifestKind::ResourceTemplates,
    ];

    /// JSON-RPC method that lists this kind.
    pub fn method(self) -> &'static str {
        match self {
            Self::Tools => "tools/list",
            Self::Prompts => "prompts/list",
            Self::Resources => "resources/list",
            Self::ResourceTemplates => "resources/templates/list",
        }
    }

    /// Directive name used in documents.
    pub fn directive_name(self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Prompts => "prompts",
            Self::Resources => "resources",
            Self::ResourceTemplates => "resource_templates",
        }
    }

    /// Parse a directive name.
    pub fn from_directive_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.directive_name() == name)
    }

    /// Human-readable noun, pluralised for `count`.
    pub fn noun(self, count: usize) -> &'static str {
        match (self, count == 1) {
            (Self::Tools, true) => "tool",
            (Self::Tools, false) => "tools",
            (Self::Prompts, true) => "prompt",
            (Self::Prompts, false) => "prompts",
            (Self::Resources, true) => "resource",
            (Self::Resources, false) => "resources",
            (Self::ResourceTemplates, true) => "resource template",
            (Self::ResourceTemplates, false) => "resource templates",
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun(2))
    }
}

/// Common view over the four descriptor types.
pub trait Descriptor {
    /// Which manifest kind this descriptor belongs to.
    const KIND: ManifestKind;

    /// Entry name, unique within one server's manifest of this kind.
    fn name(&self) -> &str;
}

macro_rules! impl_descriptor {
    ($ty:ty, $kind:expr) => {
        impl Descriptor for $ty {
            const KIND: ManifestKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

impl_descriptor!(Tool, ManifestKind::Tools);
impl_descriptor!(Prompt, ManifestKind::Prompts);
impl_descriptor!(Resource, ManifestKind::Resources);
impl_descriptor!(ResourceTemplate, ManifestKind::ResourceTemplates);

/// Everything retrieved from one server.
///
/// Kinds that were not (or not yet) retrieved are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerManifest {
    pub tools: Vec<Tool>,
    pub prompts: Vec<Prompt>,
    pub resources: Vec<Resource>,
    pub resource_templates: Vec<ResourceTemplate>,
}

impl ServerManifest {
    /// Number of entries of one kind.
    pub fn count(&self, kind: ManifestKind) -> usize {
        match kind {
            ManifestKind::Tools => self.tools.len(),
            ManifestKind::Prompts => self.prompts.len(),
            ManifestKind::Resources => self.resources.len(),
            ManifestKind::ResourceTemplates => self.resource_templates.len(),
        }
    }
}
