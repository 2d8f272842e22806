//! Workgraph MCP server binary.
//!
//! Speaks JSON-RPC 2.0 over stdio; logs go to stderr so stdout stays a
//! clean protocol channel.

use anyhow::Result;
use workgraph::mcp::McpServer;
use workgraph::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let state = AppState::in_memory(config);

    let mut server = McpServer::new(state);
    server.run().await
}
