//! # App Store Connect MCP
//!
//! This crate provides an MCP (Model Context Protocol) server exposing the
//! App Store Connect REST API as tools, spoken as newline-delimited
//! JSON-RPC 2.0 over stdin and stdout.
//!
//! ## Overview
//!
//! The asc-mcp crate handles:
//! - **Protocol**: JSON-RPC envelopes, the MCP handshake and method dispatch
//! - **Stdio**: Line framing and a locked response writer
//! - **Clients**: Authenticated, paginated HTTP calls to App Store Connect
//! - **Tools**: Tool definitions translating arguments into API requests
//!
//! Token signing and caching live in the `asc-auth` crate.
//!
//! ## MCP Protocol
//!
//! Supported methods:
//! - `initialize`: Negotiate the protocol version and start the session
//! - `ping`: Liveness check
//! - `notifications/initialized`, `notifications/cancelled`: Client notifications
//! - `tools/list`: List available tools
//! - `tools/call`: Execute a tool
//!
//! ## Available Tools
//!
//! ### Apps
//! - `list_apps`: List apps, optionally by bundle id
//! - `get_app`: Get one app
//!
//! ### Builds
//! - `list_builds`: List builds of an app
//!
//! ### TestFlight
//! - `list_beta_groups`: List beta groups of an app
//! - `create_beta_group`: Create a beta group
//! - `delete_beta_tester`: Remove a beta tester
//!
//! ## Usage
//!
//! ### Creating an MCP Server
//!
//! ```rust,no_run
//! use asc_mcp::{McpServer, Tool, ToolDefinition, ToolRegistry, ToolResult};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MyTool;
//!
//! #[async_trait]
//! impl Tool for MyTool {
//!     fn definition(&self) -> ToolDefinition {
//!         ToolDefinition::new("my_tool", "Does something useful").read_only()
//!     }
//!
//!     async fn execute(
//!         &self,
//!         args: serde_json::Value,
//!     ) -> Result<ToolResult, asc_mcp::McpServerError> {
//!         Ok(ToolResult::text("Done!"))
//!     }
//! }
//!
//! async fn setup() -> std::io::Result<()> {
//!     let mut registry = ToolRegistry::new();
//!     registry.register(Arc::new(MyTool)).expect("unique name");
//!
//!     let server = McpServer::app_store_connect(registry);
//!     asc_mcp::serve_stdio(&server).await
//! }
//! ```
//!
//! ### Handling a Single Line
//!
//! ```rust,no_run
//! use asc_mcp::McpServer;
//!
//! async fn handle(server: &McpServer, line: &str) {
//!     if let Some(response) = server.handle_line(line).await {
//!         println!("{}", serde_json::to_string(&response).unwrap());
//!     }
//! }
//! ```

pub mod clients;
pub mod retry;
pub mod server;
pub mod stdio;
pub mod tools;
pub mod types;

// Re-export main types
pub use retry::{with_retry, with_retry_if, RetryConfig};
pub use server::{FunctionTool, McpServer, McpServerError, McpServerResult, Session, Tool, ToolRegistry};
pub use stdio::{serve, serve_stdio, ResponseWriter};
pub use types::{
    ContentBlock, Implementation, McpError, McpRequest, McpResponse, RequestId,
    ServerCapabilities, ToolAnnotations, ToolCall, ToolCapabilities, ToolDefinition, ToolResult,
};

// Re-export tool collections
pub use tools::{all_tools, app_tools, build_tools, registry, testflight_tools, ApiContext};

// Re-export the API client
pub use clients::{AppStoreClient, ConfigError, ServiceConfig, ServiceEndpoint, TransportError};
