//! Model Context Protocol surface
//!
//! Exposes the tool registry to MCP clients over stdio: `initialize`,
//! `ping`, `tools/list` and `tools/call`.

pub mod protocol;
mod server;

pub use server::McpServer;
