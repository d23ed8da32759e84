//! MCP (Model Context Protocol) Server Implementation
//!
//! Exposes the capability tools to an external agent runtime over
//! JSON-RPC 2.0, following MCP protocol version 2025-06-18.


pub mod protocol;
pub mod server;

pub use server::{ConnectionState, McpServer, MessageHandler};
