//! JSON-RPC 2.0 tool surface in the MCP style.
//!
//! Stateless: the transport never issues session ids. Tools are exposed
//! under the `workgraph.` namespace via `tools/list` and `tools/call`.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::*;
pub use server::McpServer;

/// Namespace prefix for every exposed tool.
pub const TOOL_NAMESPACE: &str = "workgraph";
