//! # mcpdocs-mcp
//!
//! MCP (Model Context Protocol) metadata acquisition for mcpdocs.
//!
//! This crate provides:
//! - stdio and streamable HTTP transports
//! - An MCP session that lists tools, prompts, resources and resource templates
//! - The build-time fetch pass and the published metadata store
//! - Directive queries and Markdown rendering over the store

pub mod client;
pub mod directives;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod http;
pub mod manifest;
pub mod orchestrator;
pub mod protocol;
pub mod render;
pub mod sse;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{Connector, DefaultConnector, McpConnection};
pub use directives::{DirectiveArgs, Entry};
pub use error::{
    BuildError, FetchStep, McpError, RenderError, ServerFetchError, TransportError,
    UnknownServerError,
};
pub use fetcher::MetadataFetcher;
pub use filter::ServerFilter;
pub use manifest::{ManifestKind, ServerManifest};
pub use orchestrator::{BuildContext, BuildMetadataOrchestrator};
pub use store::{ArtifactMap, MetadataStore};
