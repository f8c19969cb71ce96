// crates/mcp/src/lib.rs
//! The MCP JSON-RPC request loop (C8): protocol wire types, tool catalog,
//! and the stdio server driving them.

pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcResponse, TextContent, ToolCallResult};
pub use server::McpServer;
pub use tools::ToolName;
