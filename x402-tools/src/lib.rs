//! Paid 402box agent tools with x402 micropayments.
//!
//! `x_searcher` and `find_people` forward a query to their remote agent and
//! pay for each call with an EIP-3009 USDC authorization signed by a local
//! wallet. The tools are served over MCP (stdio) by the `x402-tools` binary.

pub mod agents;
pub mod config;
pub mod credentials;
pub mod http;
pub mod mcp;
pub mod tools;
pub mod x402;
