//! `create_plan` tool: replaces the thread's active plan with a new checklist.

use async_trait::async_trait;
use serde_json::json;

use crate::conversation::{Plan, PlanItem, PlanItemStatus};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::{render_plan, save_plan};

pub const TOOL_CREATE_PLAN: &str = "create_plan";

/// Tool that starts (or replaces) the active plan for the calling thread.
pub struct CreatePlanTool;

#[async_trait]
impl Tool for CreatePlanTool {
    fn name(&self) -> &str {
        TOOL_CREATE_PLAN
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_CREATE_PLAN.to_string(),
            description: Some(
                "Start a plan for a multi-step task: a checklist of steps that update_plan \
                 can later mark in_progress/completed. Use for tasks with more than two or \
                 three distinct steps; skip it for trivial one-shot requests."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string" },
                                "description": { "type": "string" }
                            },
                            "required": ["title"]
                        },
                        "minItems": 1
                    }
                },
                "required": ["items"]
            }),
            approval_type: crate::tool_source::ApprovalType::None,
            category: crate::tool_source::ToolCategory::Plan,
            parallel_safe: false,
        }
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let items_arg = args
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing or invalid 'items' array".to_string()))?;

        if items_arg.is_empty() {
            return Err(ToolSourceError::InvalidInput("'items' must not be empty".to_string()));
        }

        let mut items = Vec::with_capacity(items_arg.len());
        for (i, item) in items_arg.iter().enumerate() {
            let title = item
                .get("title")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolSourceError::InvalidInput(format!("items[{}] missing 'title'", i)))?
                .to_string();
            let description = item
                .get("description")
                .and_then(|v| v.as_str())
                .map(String::from);
            items.push(PlanItem {
                id: (i + 1).to_string(),
                title,
                status: PlanItemStatus::Pending,
                description,
            });
        }

        let plan = Plan::new(items);
        let thread_id = ctx.and_then(|c| c.thread_id.as_deref());
        save_plan(thread_id, &plan)?;

        Ok(ToolCallContent {
            text: render_plan(&plan),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_plan_rejects_empty_items() {
        let tool = CreatePlanTool;
        let err = tool.call(json!({ "items": [] }), None).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_plan_persists_and_renders_checklist() {
        let _g = crate::tools::plan::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());

        let tool = CreatePlanTool;
        let ctx = ToolCallContext::new(vec![]).with_thread_id("thread-a");
        let out = tool
            .call(
                json!({ "items": [{ "title": "write tests" }, { "title": "ship it" }] }),
                Some(&ctx),
            )
            .await
            .unwrap();

        assert!(out.text.contains("write tests"));
        assert!(out.text.contains("ship it"));

        let loaded = super::super::load_plan(Some("thread-a")).unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
    }
}
