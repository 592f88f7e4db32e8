//! Model Context Protocol (MCP) server implementation
//!
//! JSON-RPC 2.0 over stdio. Exposes `interlude.review_prompt`, which lets an
//! agent hand a prompt to a human reviewer and wait for the decision.

pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::McpServer;
pub use tools::{ToolHandler, REVIEW_TOOL};
