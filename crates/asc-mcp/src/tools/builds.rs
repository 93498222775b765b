//! Build tools

use super::{limit_schema, list_limit, parse_args, resource_id, ApiContext};
use crate::clients::{RequestPayload, Resource};
use crate::server::{McpServerError, McpServerResult, Tool};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument};

const PROCESSING_STATES: &[&str] = &["PROCESSING", "FAILED", "INVALID", "VALID"];

/// Tool to list uploaded builds of an app, newest first.
pub struct ListBuildsTool {
    ctx: ApiContext,
}

impl ListBuildsTool {
    /// Create the tool.
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ListBuildsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("list_builds", "List builds uploaded for an app, newest first")
            .with_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "app_id": {
                        "type": "string",
                        "description": "The App Store Connect app id"
                    },
                    "version": {
                        "type": "string",
                        "description": "Only return builds with this build number"
                    },
                    "processing_state": {
                        "type": "string",
                        "enum": PROCESSING_STATES,
                        "description": "Only return builds in this processing state"
                    },
                    "limit": limit_schema()
                },
                "required": ["app_id"]
            }))
            .read_only()
    }

    #[instrument(skip(self, args), fields(tool = "list_builds"))]
    async fn execute(&self, args: Value) -> McpServerResult<ToolResult> {
        let params: ListBuildsParams = parse_args(args)?;
        let app_id = resource_id("app_id", &params.app_id)?;
        let limit = list_limit(params.limit)?;

        let mut query = vec![
            ("filter[app]", app_id.to_string()),
            ("sort", "-uploadedDate".to_string()),
        ];
        if let Some(version) = params.version.filter(|v| !v.trim().is_empty()) {
            query.push(("filter[version]", version.trim().to_string()));
        }
        if let Some(state) = params.processing_state {
            if !PROCESSING_STATES.contains(&state.as_str()) {
                return Err(McpServerError::InvalidParams(format!(
                    "processing_state must be one of {}, got {}",
                    PROCESSING_STATES.join(", "),
                    state
                )));
            }
            query.push(("filter[processingState]", state));
        }
        let query = RequestPayload::query(query);

        debug!(app_id, limit, "Listing builds");

        let client = self.ctx.client();
        match self
            .ctx
            .read(|| client.list::<Resource>("/v1/builds", query.clone(), limit))
            .await
        {
            Ok(builds) => Ok(ToolResult::json(serde_json::json!({
                "app_id": app_id,
                "count": builds.len(),
                "builds": builds
            }))),
            Err(e) => {
                error!("Failed to list builds: {}", e);
                Ok(ToolResult::error(format!("Failed to list builds: {}", e)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListBuildsParams {
    app_id: String,
    version: Option<String>,
    processing_state: Option<String>,
    limit: Option<u64>,
}

/// Get all build tools.
pub fn build_tools(ctx: &ApiContext) -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(ListBuildsTool::new(ctx.clone()))]
}
