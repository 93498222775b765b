//! TestFlight tools
//!
//! Beta groups and beta testers. Reads are retried on transient failures;
//! the create and delete calls are sent exactly once.

use super::{limit_schema, list_limit, parse_args, resource_id, ApiContext};
use crate::clients::{RequestPayload, Resource};
use crate::server::{McpServerError, McpServerResult, Tool};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Tool to list the beta groups of an app.
pub struct ListBetaGroupsTool {
    ctx: ApiContext,
}

impl ListBetaGroupsTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ListBetaGroupsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_beta_groups", "List TestFlight beta groups of an app")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "app_id": {
                        "type": "string",
                        "description": "The App Store Connect app id"
                    },
                    "limit": limit_schema()
                },
                "required": ["app_id"]
            }))
            .read_only()
    }

    #[instrument(skip(self, args), fields(tool = "list_beta_groups"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: ListBetaGroupsParams = parse_args(args)?;
        let app_id = resource_id("app_id", &params.app_id)?;
        let limit = list_limit(params.limit)?;
        let path = format!("/v1/apps/{}/betaGroups", app_id);
        let path = path.as_str();

        debug!(app_id, limit, "Listing beta groups");

        let client = self.ctx.client();
        match self
            .ctx
            .read(|| client.list::<Resource>(path, RequestPayload::None, limit))
            .await
        {
            Ok(groups) => Ok(ToolResult::json(serde_json::json!({
                "app_id": app_id,
                "count": groups.len(),
                "beta_groups": groups
            }))),
            Err(e) => {
                error!("Failed to list beta groups: {}", e);
                Ok(ToolResult::error(format!("Failed to list beta groups: {}", e)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListBetaGroupsParams {
    app_id: String,
    limit: Option<u64>,
}

/// Tool to create a beta group for an app.
pub struct CreateBetaGroupTool {
    ctx: ApiContext,
}

impl CreateBetaGroupTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for CreateBetaGroupTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create_beta_group", "Create a TestFlight beta group for an app")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "app_id": {
                        "type": "string",
                        "description": "The App Store Connect app id"
                    },
                    "name": {
                        "type": "string",
                        "description": "Name of the new group"
                    },
                    "public_link_enabled": {
                        "type": "boolean",
                        "description": "Whether anyone with the public link can join",
                        "default": false
                    },
                    "feedback_enabled": {
                        "type": "boolean",
                        "description": "Whether testers can send feedback",
                        "default": true
                    }
                },
                "required": ["app_id", "name"]
            }))
            .destructive(false)
    }

    #[instrument(skip(self, args), fields(tool = "create_beta_group"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: CreateBetaGroupParams = parse_args(args)?;
        let app_id = resource_id("app_id", &params.app_id)?;
        let name = params.name.trim();
        if name.is_empty() {
            return Err(McpServerError::InvalidParams("name must not be empty".to_string()));
        }

        let body = serde_json::json!({
            "data": {
                "type": "betaGroups",
                "attributes": {
                    "name": name,
                    "publicLinkEnabled": params.public_link_enabled,
                    "feedbackEnabled": params.feedback_enabled
                },
                "relationships": {
                    "app": {
                        "data": {"type": "apps", "id": app_id}
                    }
                }
            }
        });

        match self.ctx.client().post::<Resource>("/v1/betaGroups", body).await {
            Ok(group) => {
                info!(app_id, group_id = %group.id, "Created beta group");
                Ok(ToolResult::json(serde_json::json!({ "beta_group": group })))
            }
            Err(e) => {
                error!("Failed to create beta group: {}", e);
                Ok(ToolResult::error(format!("Failed to create beta group: {}", e)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateBetaGroupParams {
    app_id: String,
    name: String,
    #[serde(default)]
    public_link_enabled: bool,
    #[serde(default = "default_feedback_enabled")]
    feedback_enabled: bool,
}

fn default_feedback_enabled() -> bool {
    true
}

/// Tool to remove a beta tester from all apps and groups.
pub struct DeleteBetaTesterTool {
    ctx: ApiContext,
}

impl DeleteBetaTesterTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for DeleteBetaTesterTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "delete_beta_tester",
            "Remove a beta tester from TestFlight, revoking access to all builds",
        )
        .with_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "tester_id": {
                    "type": "string",
                    "description": "The beta tester id"
                }
            },
            "required": ["tester_id"]
        }))
        .destructive(true)
    }

    #[instrument(skip(self, args), fields(tool = "delete_beta_tester"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: DeleteBetaTesterParams = parse_args(args)?;
        let tester_id = resource_id("tester_id", &params.tester_id)?;
        let path = format!("/v1/betaTesters/{}", tester_id);

        match self.ctx.client().delete(&path).await {
            Ok(()) => {
                info!(tester_id, "Deleted beta tester");
                Ok(ToolResult::json(serde_json::json!({
                    "tester_id": tester_id,
                    "deleted": true
                })))
            }
            Err(e) => {
                error!("Failed to delete beta tester {}: {}", tester_id, e);
                Ok(ToolResult::error(format!(
                    "Failed to delete beta tester {}: {}",
                    tester_id, e
                )))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeleteBetaTesterParams {
    tester_id: String,
}

/// Get all TestFlight tools.
pub fn testflight_tools(ctx: &ApiContext) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListBetaGroupsTool::new(ctx.clone())),
        Arc::new(CreateBetaGroupTool::new(ctx.clone())),
        Arc::new(DeleteBetaTesterTool::new(ctx.clone())),
    ]
}
