//! Read-only queries over the published store.
//!
//! Each query validates its server filter before looking at any entry, so an
//! unknown server fails the directive even when other servers have entries.

use crate::error::UnknownServerError;
use crate::filter::ServerFilter;
use crate::manifest::Descriptor;
use crate::protocol::{Prompt, Resource, ResourceTemplate, Tool};
use crate::store::{ArtifactMap, MetadataStore};

/// Arguments accepted by every directive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveArgs {
    /// Only entries of this server, shown unprefixed.
    pub server: Option<String>,
    /// Only entries whose name starts with this.
    pub prefix: Option<String>,
}

impl DirectiveArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_server(server: impl Into<String>) -> Self {
        Self {
            server: Some(server.into()),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn filter(&self) -> ServerFilter<'_> {
        ServerFilter::new(self.server.as_deref())
    }
}

/// One entry selected by a directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'a, T> {
    /// Server the entry came from.
    pub server: &'a str,
    /// Name to show in rendered output.
    pub display_name: String,
    /// The descriptor as received from the server.
    pub descriptor: &'a T,
}

/// Tools matching `args`.
pub fn tools<'a>(
    store: &'a MetadataStore,
    args: &DirectiveArgs,
) -> Result<Vec<Entry<'a, Tool>>, UnknownServerError> {
    select(store.tools(), args)
}

/// Prompts matching `args`.
pub fn prompts<'a>(
    store: &'a MetadataStore,
    args: &DirectiveArgs,
) -> Result<Vec<Entry<'a, Prompt>>, UnknownServerError> {
    select(store.prompts(), args)
}

/// Resources matching `args`.
pub fn resources<'a>(
    store: &'a MetadataStore,
    args: &DirectiveArgs,
) -> Result<Vec<Entry<'a, Resource>>, UnknownServerError> {
    select(store.resources(), args)
}

/// Resource templates matching `args`.
pub fn resource_templates<'a>(
    store: &'a MetadataStore,
    args: &DirectiveArgs,
) -> Result<Vec<Entry<'a, ResourceTemplate>>, UnknownServerError> {
    select(store.resource_templates(), args)
}

fn select<'a, T: Descriptor>(
    map: &'a ArtifactMap<T>,
    args: &DirectiveArgs,
) -> Result<Vec<Entry<'a, T>>, UnknownServerError> {
    let filter = args.filter();
    filter.check(map)?;

    let prefix = args.prefix.as_deref().unwrap_or("");
    let entries = map
        .iter()
        .filter(|(server, _)| filter.admits(server))
        .flat_map(move |(server, descriptors)| {
            descriptors
                .iter()
                .filter(move |d| d.name().starts_with(prefix))
                .map(move |descriptor| Entry {
                    server,
                    display_name: filter.display_name(server, descriptor.name()),
                    descriptor,
                })
        })
        .collect();

    Ok(entries)
}
