//! x402 Protocol implementation for pay-per-use AI endpoints
//!
//! This module handles the x402 payment protocol flow:
//! 1. Make initial request
//! 2. If 402 returned, parse payment requirements (header or body)
//! 3. Sign EIP-3009 authorization with the local wallet
//! 4. Retry with X-PAYMENT header

mod client;
mod signer;
mod types;

pub use client::{X402Client, X402Error};
pub use signer::X402Signer;
pub use types::*;
