//! # mcpdocs-core
//!
//! Core types for mcpdocs, which documents Model Context Protocol servers
//! as part of a documentation build.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - The validated server registry
//! - Common error types

pub mod config;
pub mod error;

pub use config::{
    Config, FetchPolicy, McpConfig, RawServerConfig, ServerConfig, ServerRegistry,
    TransportConfig,
};
pub use error::{ConfigurationError, Error, Result};
