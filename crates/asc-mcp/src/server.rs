//! MCP server implementation
//!
//! This module holds the protocol engine: session state, method dispatch and
//! the tool registry the engine calls into. Line framing and output live in
//! [`crate::stdio`].

use crate::types::*;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// MCP server error types.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A tool with this name is already registered
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Tool execution failed
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for MCP server operations.
pub type McpServerResult<T> = Result<T, McpServerError>;

/// Trait for tool implementations.
///
/// Handlers return upstream failures as `Ok(ToolResult::error(..))` or as
/// an `Err`; the registry turns both into an error-shaped tool result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments.
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult>;
}

/// Name-indexed table of tools.
///
/// Built once before serving; names are unique for the lifetime of the
/// registry. Listing order is by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, rejecting duplicate names.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> McpServerResult<()> {
        let name = tool.definition().name;
        if self.tools.contains_key(&name) {
            return Err(McpServerError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register multiple tools.
    pub fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) -> McpServerResult<()> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Get all tool definitions.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name.
    ///
    /// The handler runs on its own task so that a panic inside it is caught
    /// here and reported as an internal error instead of unwinding through
    /// the read loop.
    pub async fn call(&self, name: &str, arguments: Value) -> McpServerResult<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| McpServerError::ToolNotFound(name.to_string()))?;

        let handle = tokio::spawn(async move { tool.execute(arguments).await });

        match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                error!(tool = %name, "Tool handler panicked");
                Err(McpServerError::Internal(format!("tool '{}' panicked", name)))
            }
            Err(join_error) => Err(McpServerError::Internal(join_error.to_string())),
        }
    }
}

/// Handshake state of one connection.
///
/// Starts uninitialized; `initialize` moves it to ready and nothing moves
/// it back.
#[derive(Debug, Default)]
pub struct Session {
    initialized: AtomicBool,
    client_ready: AtomicBool,
}

impl Session {
    /// Create an uninitialized session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the handshake has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Whether the client sent `notifications/initialized`.
    pub fn is_client_ready(&self) -> bool {
        self.client_ready.load(Ordering::SeqCst)
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    fn mark_client_ready(&self) {
        self.client_ready.store(true, Ordering::SeqCst);
    }
}

/// Outcome of recovering the `id` member from a raw message.
enum RecoveredId {
    Absent,
    Present(RequestId),
    Unrecoverable,
}

fn recover_id(value: &Value) -> RecoveredId {
    match value.get("id") {
        None | Some(Value::Null) => RecoveredId::Absent,
        Some(raw) => match serde_json::from_value::<RequestId>(raw.clone()) {
            Ok(id) => RecoveredId::Present(id),
            Err(_) => RecoveredId::Unrecoverable,
        },
    }
}

/// App Store Connect MCP server.
///
/// Owns the session and the tool registry. One instance serves one
/// connection.
pub struct McpServer {
    /// Server info
    info: Implementation,

    /// Server capabilities
    capabilities: ServerCapabilities,

    /// Usage hints returned from `initialize`
    instructions: Option<String>,

    /// Registered tools
    registry: ToolRegistry,

    /// Handshake state
    session: Session,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(name: impl Into<String>, version: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: false,
                }),
            },
            instructions: None,
            registry,
            session: Session::new(),
        }
    }

    /// Create with the default server identity.
    pub fn app_store_connect(registry: ToolRegistry) -> Self {
        Self::new("app-store-connect-mcp", env!("CARGO_PKG_VERSION"), registry)
            .with_instructions(
                "Tools for the App Store Connect API: apps, builds and TestFlight groups.",
            )
    }

    /// Set the instructions returned from `initialize`.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Get server info.
    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Get server capabilities.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Get the session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Get the tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw input line.
    ///
    /// Returns `None` for blank lines and notifications. A line that is not
    /// a well-formed envelope yields a parse error, carrying the request id
    /// when one can be recovered.
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable line");
                return Some(McpResponse::error(
                    None,
                    McpError::parse_error().with_data(e.to_string()),
                ));
            }
        };

        let id = recover_id(&value);

        let request: McpRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Discarding malformed envelope");
                let error = McpError::parse_error().with_data(e.to_string());
                return match id {
                    RecoveredId::Absent => None,
                    RecoveredId::Present(id) => Some(McpResponse::error(Some(id), error)),
                    RecoveredId::Unrecoverable => Some(McpResponse::error(None, error)),
                };
            }
        };

        self.handle_request(request).await
    }

    /// Handle a decoded request.
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        if !request.has_valid_version() {
            return Some(McpResponse::error(
                Some(id),
                McpError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}, expected \"{}\"",
                    request.jsonrpc, JSONRPC_VERSION
                )),
            ));
        }

        Some(self.dispatch(id, &request.method, request.params).await)
    }

    fn handle_notification(&self, request: &McpRequest) {
        if !request.has_valid_version() {
            debug!(jsonrpc = %request.jsonrpc, "Ignoring notification with wrong version");
            return;
        }

        match request.method.as_str() {
            "notifications/initialized" => {
                self.session.mark_client_ready();
                debug!("Client acknowledged initialization");
            }
            "notifications/cancelled" => {
                // Requests run to completion; nothing to cancel.
                debug!("Ignoring cancellation notification");
            }
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    async fn dispatch(&self, id: RequestId, method: &str, params: Option<Value>) -> McpResponse {
        match method {
            "initialize" => self.handle_initialize(id, params),
            "ping" => McpResponse::success(id, serde_json::json!({})),
            "notifications/initialized" => {
                self.session.mark_client_ready();
                McpResponse::success(id, serde_json::json!({}))
            }
            "tools/list" | "tools/call" if !self.session.is_initialized() => {
                McpResponse::error(Some(id), McpError::not_initialized(method))
            }
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, params).await,
            _ => McpResponse::error(Some(id), McpError::method_not_found(method)),
        }
    }

    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> McpResponse {
        let params: InitializeParams = match params {
            None | Some(Value::Null) => InitializeParams::default(),
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return McpResponse::error(Some(id), McpError::invalid_params(e.to_string()))
                }
            },
        };

        let protocol_version = negotiate_protocol_version(params.protocol_version.as_deref());

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };

        let result = match serde_json::to_value(result) {
            Ok(value) => value,
            Err(e) => return McpResponse::error(Some(id), McpError::internal_error(e.to_string())),
        };

        self.session.mark_initialized();
        info!(
            protocol_version,
            client = params.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            "Session initialized"
        );

        McpResponse::success(id, result)
    }

    fn handle_tools_list(&self, id: RequestId) -> McpResponse {
        let tools = self.registry.list();
        McpResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> McpResponse {
        let params = match params {
            Some(p) => p,
            None => return McpResponse::error(Some(id), McpError::invalid_params("Missing params")),
        };

        let call: ToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return McpResponse::error(Some(id), McpError::invalid_params(e.to_string())),
        };

        if call.name.trim().is_empty() {
            return McpResponse::error(Some(id), McpError::invalid_params("Tool name is empty"));
        }

        let arguments = match call.arguments {
            None | Some(Value::Null) => serde_json::json!({}),
            Some(args @ Value::Object(_)) => args,
            Some(_) => {
                return McpResponse::error(
                    Some(id),
                    McpError::invalid_params("Tool arguments must be an object"),
                )
            }
        };

        debug!(tool = %call.name, "Calling tool");

        let result = match self.registry.call(&call.name, arguments).await {
            Ok(result) => result,
            Err(McpServerError::ToolNotFound(name)) => {
                return McpResponse::error(
                    Some(id),
                    McpError::invalid_params(format!("Unknown tool: {}", name)),
                )
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::error(e.to_string())
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(Some(id), McpError::internal_error(e.to_string())),
        }
    }
}

/// Simple tool wrapper for function-based tools.
pub struct FunctionTool<F>
where
    F: Fn(Value) -> McpServerResult<ToolResult> + Send + Sync,
{
    definition: ToolDefinition,
    handler: F,
}

impl<F> FunctionTool<F>
where
    F: Fn(Value) -> McpServerResult<ToolResult> + Send + Sync,
{
    /// Create a new function-based tool.
    pub fn new(definition: ToolDefinition, handler: F) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

#[async_trait]
impl<F> Tool for FunctionTool<F>
where
    F: Fn(Value) -> McpServerResult<ToolResult> + Send + Sync,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        (self.handler)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestTool;

    #[async_trait]
    impl Tool for TestTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("test_tool", "A test tool").read_only()
        }

        async fn execute(&self, _args: Value) -> McpServerResult<ToolResult> {
            Ok(ToolResult::text("Test result"))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new("panicking_tool", "Always panics")
        }

        async fn execute(&self, _args: Value) -> McpServerResult<ToolResult> {
            panic!("handler bug");
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TestTool)).unwrap();
        registry.register(Arc::new(PanickingTool)).unwrap();
        registry
            .register(Arc::new(FunctionTool::new(
                ToolDefinition::new("echo", "Echo arguments"),
                |args| Ok(ToolResult::text(args.to_string())),
            )))
            .unwrap();
        registry
            .register(Arc::new(FunctionTool::new(
                ToolDefinition::new("failing_tool", "Always fails"),
                |_| Err(McpServerError::InvalidParams("missing app_id".to_string())),
            )))
            .unwrap();
        registry
    }

    fn server() -> McpServer {
        McpServer::app_store_connect(registry())
    }

    async fn initialize(server: &McpServer) {
        let resp = server
            .handle_request(McpRequest::new(0, "initialize"))
            .await
            .unwrap();
        assert!(resp.error.is_none());
    }

    fn error_code(resp: &McpResponse) -> i32 {
        resp.error.as_ref().map(|e| e.code).unwrap_or(0)
    }

    #[test]
    fn test_server_creation() {
        let server = server();
        assert_eq!(server.info().name, "app-store-connect-mcp");
        assert!(!server.session().is_initialized());
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(TestTool)).unwrap();
        let result = registry.register(Arc::new(TestTool));
        assert!(matches!(result, Err(McpServerError::DuplicateTool(name)) if name == "test_tool"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_transitions_to_ready() {
        let server = server();
        let resp = server
            .handle_request(McpRequest::new(1, "initialize").with_params(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0"}
            })))
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(resp.jsonrpc, "2.0");
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "app-store-connect-mcp");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let server = server();
        initialize(&server).await;
        initialize(&server).await;
        assert!(server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_rejects_malformed_params() {
        let server = server();
        let resp = server
            .handle_request(
                McpRequest::new(1, "initialize")
                    .with_params(serde_json::json!({"protocolVersion": 42})),
            )
            .await
            .unwrap();

        assert_eq!(error_code(&resp), McpError::INVALID_PARAMS);
        assert!(!server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_session_methods_gated_before_initialize() {
        let server = server();

        for method in ["tools/list", "tools/call"] {
            let resp = server
                .handle_request(McpRequest::new(1, method).with_params(serde_json::json!({
                    "name": "test_tool"
                })))
                .await
                .unwrap();
            assert_eq!(error_code(&resp), McpError::NOT_INITIALIZED);
        }

        assert!(!server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_ping_works_before_initialize() {
        let server = server();
        let resp = server
            .handle_request(McpRequest::new(1, "ping"))
            .await
            .unwrap();
        assert_eq!(resp.result, Some(serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server();
        let resp = server
            .handle_request(McpRequest::new(1, "resources/list"))
            .await
            .unwrap();
        assert_eq!(error_code(&resp), McpError::METHOD_NOT_FOUND);

        initialize(&server).await;
        let resp = server
            .handle_request(McpRequest::new(2, "resources/list"))
            .await
            .unwrap();
        assert_eq!(error_code(&resp), McpError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_version_rejected_without_state_change() {
        let server = server();
        let resp = server
            .handle_line(r#"{"jsonrpc":"1.0","id":1,"method":"initialize"}"#)
            .await
            .unwrap();

        assert_eq!(error_code(&resp), McpError::INVALID_REQUEST);
        assert_eq!(resp.id, Some(RequestId::from(1)));
        assert!(!server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_missing_or_numeric_version_is_invalid_request() {
        let server = server();

        let lines = [
            (r#"{"id":1,"method":"initialize"}"#, RequestId::from(1)),
            (r#"{"jsonrpc":2.0,"id":2,"method":"initialize"}"#, RequestId::from(2)),
            (r#"{"jsonrpc":null,"id":"x","method":"ping"}"#, RequestId::from("x")),
        ];
        for (line, id) in lines {
            let resp = server.handle_line(line).await.unwrap();
            assert_eq!(error_code(&resp), McpError::INVALID_REQUEST, "line: {}", line);
            assert_eq!(resp.id, Some(id));
        }

        assert!(!server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_fractional_id_is_echoed() {
        let server = server();
        let resp = server
            .handle_line(r#"{"jsonrpc":"2.0","id":3.5,"method":"ping"}"#)
            .await
            .unwrap();

        assert!(resp.error.is_none());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["id"], 3.5);
    }

    #[tokio::test]
    async fn test_notifications_never_answered() {
        let server = server();

        let lines = [
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","method":"tools/list"}"#,
            r#"{"jsonrpc":"2.0","method":"no/such/method"}"#,
            r#"{"jsonrpc":"1.0","method":"initialize"}"#,
            r#"{"jsonrpc":"2.0","id":null,"method":"tools/call"}"#,
            r#"{"jsonrpc":"2.0"}"#,
        ];
        for line in lines {
            assert!(server.handle_line(line).await.is_none(), "answered: {}", line);
        }

        assert!(server.session().is_client_ready());
        assert!(!server.session().is_initialized());
    }

    #[tokio::test]
    async fn test_parse_error_without_id() {
        let server = server();
        let resp = server.handle_line("{not json").await.unwrap();
        assert_eq!(error_code(&resp), McpError::PARSE_ERROR);
        assert!(resp.id.is_none());
    }

    #[tokio::test]
    async fn test_bad_envelope_keeps_recovered_id() {
        let server = server();
        let resp = server
            .handle_line(r#"{"jsonrpc":"2.0","id":"abc","method":5}"#)
            .await
            .unwrap();
        assert_eq!(error_code(&resp), McpError::PARSE_ERROR);
        assert_eq!(resp.id, Some(RequestId::String("abc".to_string())));

        let resp = server
            .handle_line(r#"{"jsonrpc":"2.0","id":{"nested":true},"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(error_code(&resp), McpError::PARSE_ERROR);
        assert!(resp.id.is_none());
    }

    #[tokio::test]
    async fn test_blank_lines_ignored() {
        let server = server();
        assert!(server.handle_line("").await.is_none());
        assert!(server.handle_line("   \t\r").await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_after_initialize() {
        let server = server();
        initialize(&server).await;

        let resp = server
            .handle_request(McpRequest::new(2, "tools/list"))
            .await
            .unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().clone();

        assert_eq!(tools.len(), 4);
        assert!(tools.iter().any(|t| t["name"] == "test_tool"));
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let server = server();
        initialize(&server).await;

        let resp = server
            .handle_request(McpRequest::new(3, "tools/call").with_params(serde_json::json!({
                "name": "echo",
                "arguments": {"app_id": "123"}
            })))
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["text"], r#"{"app_id":"123"}"#);
    }

    #[tokio::test]
    async fn test_tools_call_defaults_arguments() {
        let server = server();
        initialize(&server).await;

        let resp = server
            .handle_request(
                McpRequest::new(3, "tools/call").with_params(serde_json::json!({"name": "echo"})),
            )
            .await
            .unwrap();
        assert_eq!(resp.result.unwrap()["content"][0]["text"], "{}");
    }

    #[tokio::test]
    async fn test_tools_call_validation() {
        let server = server();
        initialize(&server).await;

        let cases = [
            None,
            Some(serde_json::json!({"arguments": {}})),
            Some(serde_json::json!({"name": ""})),
            Some(serde_json::json!({"name": "echo", "arguments": [1, 2]})),
            Some(serde_json::json!({"name": "no_such_tool"})),
        ];

        for params in cases {
            let mut request = McpRequest::new(4, "tools/call");
            request.params = params.clone();
            let resp = server.handle_request(request).await.unwrap();
            assert_eq!(error_code(&resp), McpError::INVALID_PARAMS, "params: {:?}", params);
        }
    }

    #[tokio::test]
    async fn test_tool_error_is_successful_response() {
        let server = server();
        initialize(&server).await;

        let resp = server
            .handle_request(
                McpRequest::new(5, "tools/call")
                    .with_params(serde_json::json!({"name": "failing_tool"})),
            )
            .await
            .unwrap();

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("missing app_id"));
    }

    #[tokio::test]
    async fn test_panicking_tool_is_contained() {
        let server = server();
        initialize(&server).await;

        let resp = server
            .handle_request(
                McpRequest::new(6, "tools/call")
                    .with_params(serde_json::json!({"name": "panicking_tool"})),
            )
            .await
            .unwrap();

        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);

        // The server keeps serving afterwards.
        let resp = server
            .handle_request(McpRequest::new(7, "ping"))
            .await
            .unwrap();
        assert!(resp.result.is_some());
    }
}
