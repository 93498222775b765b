//! App tools
//!
//! Listing and lookup of the apps visible to the API key.

use super::{limit_schema, list_limit, parse_args, resource_id, ApiContext};
use crate::clients::{RequestPayload, Resource};
use crate::server::{McpServerResult, Tool};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Tool to list apps.
///
/// Optionally filtered by bundle identifier.
pub struct ListAppsTool {
    ctx: ApiContext,
}

impl ListAppsTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ListAppsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_apps", "List apps in the App Store Connect account")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "bundle_id": {
                        "type": "string",
                        "description": "Only return the app with this bundle identifier"
                    },
                    "limit": limit_schema()
                },
                "required": []
            }))
            .read_only()
    }

    #[instrument(skip(self, args), fields(tool = "list_apps"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: ListAppsParams = parse_args(args)?;
        let limit = list_limit(params.limit)?;

        let mut query = Vec::new();
        if let Some(bundle_id) = params.bundle_id.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            query.push(("filter[bundleId]", bundle_id.to_string()));
        }
        let query = RequestPayload::query(query);

        debug!(limit, "Listing apps");

        let client = self.ctx.client();
        match self
            .ctx
            .read(|| client.list::<Resource>("/v1/apps", query.clone(), limit))
            .await
        {
            Ok(apps) => Ok(ToolResult::json(serde_json::json!({
                "count": apps.len(),
                "apps": apps
            }))),
            Err(e) => {
                error!("Failed to list apps: {}", e);
                Ok(ToolResult::error(format!("Failed to list apps: {}", e)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListAppsParams {
    bundle_id: Option<String>,
    limit: Option<u64>,
}

/// Tool to fetch one app by id.
pub struct GetAppTool {
    ctx: ApiContext,
}

impl GetAppTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GetAppTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_app", "Get details of a single app")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "app_id": {
                        "type": "string",
                        "description": "The App Store Connect app id"
                    }
                },
                "required": ["app_id"]
            }))
            .read_only()
    }

    #[instrument(skip(self, args), fields(tool = "get_app"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: GetAppParams = parse_args(args)?;
        let app_id = resource_id("app_id", &params.app_id)?;
        let path = format!("/v1/apps/{}", app_id);
        let path = path.as_str();

        let client = self.ctx.client();
        match self
            .ctx
            .read(|| client.get::<Resource>(path, RequestPayload::None))
            .await
        {
            Ok(app) => Ok(ToolResult::json(serde_json::json!({ "app": app }))),
            Err(e) => {
                error!("Failed to get app {}: {}", app_id, e);
                Ok(ToolResult::error(format!("Failed to get app {}: {}", app_id, e)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetAppParams {
    app_id: String,
}

/// Get all app tools.
pub fn app_tools(ctx: &ApiContext) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListAppsTool::new(ctx.clone())),
        Arc::new(GetAppTool::new(ctx.clone())),
    ]
}
