//! Context7 documentation gateway
//!
//! This crate serves library documentation from the Context7 API over two
//! interfaces that share one resolver: a JSON HTTP API (with an OpenAPI
//! description at `/docs`) and a set of MCP tools for IDE and agent clients.
//!
//! # Features
//!
//! - Look up documentation by Context7 library ID, topic, version and token budget
//! - Optional character budget with an explicit truncation flag
//! - Library search and concurrent multi-library lookups
//! - MCP tools over SSE (on their own port) or stdio
//! - Optional TLS from PEM certificate and key files
//!
//! # Modules
//!
//! - [`provider`]: Context7 HTTP client and the provider trait
//! - [`resolver`]: Validation, truncation and batching of lookups
//! - [`api`]: HTTP routes and OpenAPI document
//! - [`mcp`]: MCP server implementation and tool definitions
//! - [`server`]: Logging, TLS and transport startup
//! - [`config`]: Command-line and environment configuration

pub mod api;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prompt;
pub mod provider;
pub mod resolver;
pub mod schema;
pub mod server;
