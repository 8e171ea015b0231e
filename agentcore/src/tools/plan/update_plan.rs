//! `update_plan` tool: mutates item statuses on the thread's active plan.

use async_trait::async_trait;
use serde_json::json;

use crate::conversation::{PlanItemStatus, PlanStatus};
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSourceError};
use crate::tools::Tool;

use super::{load_plan, render_plan, save_plan};

pub const TOOL_UPDATE_PLAN: &str = "update_plan";

fn parse_status(s: &str) -> Result<PlanItemStatus, ToolSourceError> {
    match s {
        "pending" => Ok(PlanItemStatus::Pending),
        "in_progress" => Ok(PlanItemStatus::InProgress),
        "completed" => Ok(PlanItemStatus::Completed),
        other => Err(ToolSourceError::InvalidInput(format!(
            "invalid status '{}': expected pending, in_progress, or completed",
            other
        ))),
    }
}

/// Tool that updates item statuses (and optionally the plan's own status) on the
/// calling thread's active plan.
pub struct UpdatePlanTool;

#[async_trait]
impl Tool for UpdatePlanTool {
    fn name(&self) -> &str {
        TOOL_UPDATE_PLAN
    }

    fn spec(&self) -> crate::tool_source::ToolSpec {
        crate::tool_source::ToolSpec {
            name: TOOL_UPDATE_PLAN.to_string(),
            description: Some(
                "Update statuses of items on the active plan created by create_plan. \
                 Mark a step in_progress before starting it and completed right after, \
                 keeping at most one item in_progress at a time."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "updates": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": { "type": "string" },
                                "status": { "type": "string", "enum": ["pending", "in_progress", "completed"] }
                            },
                            "required": ["id", "status"]
                        },
                        "minItems": 1
                    },
                    "planStatus": { "type": "string", "enum": ["active", "completed", "abandoned"] }
                },
                "required": ["updates"]
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
        let thread_id = ctx.and_then(|c| c.thread_id.as_deref());
        let mut plan = load_plan(thread_id)?
            .ok_or_else(|| ToolSourceError::InvalidInput("no active plan; call create_plan first".to_string()))?;

        let updates = args
            .get("updates")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing or invalid 'updates' array".to_string()))?;

        for (i, update) in updates.iter().enumerate() {
            let id = update
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolSourceError::InvalidInput(format!("updates[{}] missing 'id'", i)))?;
            let status = update
                .get("status")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolSourceError::InvalidInput(format!("updates[{}] missing 'status'", i)))?;
            let status = parse_status(status)?;

            let item = plan
                .items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| ToolSourceError::InvalidInput(format!("no plan item with id '{}'", id)))?;
            item.status = status;
        }

        if let Some(plan_status) = args.get("planStatus").and_then(|v| v.as_str()) {
            plan.status = match plan_status {
                "active" => PlanStatus::Active,
                "completed" => PlanStatus::Completed,
                "abandoned" => PlanStatus::Abandoned,
                other => {
                    return Err(ToolSourceError::InvalidInput(format!(
                        "invalid planStatus '{}'",
                        other
                    )))
                }
            };
        }

        save_plan(thread_id, &plan)?;
        Ok(ToolCallContent {
            text: render_plan(&plan),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::plan::CreatePlanTool;

    #[tokio::test]
    async fn update_plan_without_existing_plan_errors() {
        let _g = crate::tools::plan::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let ctx = ToolCallContext::new(vec![]).with_thread_id("no-plan-thread");
        let tool = UpdatePlanTool;
        let err = tool
            .call(json!({ "updates": [{ "id": "1", "status": "completed" }] }), Some(&ctx))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn update_plan_marks_item_completed() {
        let _g = crate::tools::plan::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let ctx = ToolCallContext::new(vec![]).with_thread_id("thread-b");

        CreatePlanTool
            .call(json!({ "items": [{ "title": "step" }] }), Some(&ctx))
            .await
            .unwrap();

        let tool = UpdatePlanTool;
        let out = tool
            .call(
                json!({ "updates": [{ "id": "1", "status": "completed" }], "planStatus": "completed" }),
                Some(&ctx),
            )
            .await
            .unwrap();

        assert!(out.text.contains("[x] step"));
        assert!(out.text.contains("Completed"));
    }

    #[tokio::test]
    async fn update_plan_unknown_item_id_errors() {
        let _g = crate::tools::plan::XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let ctx = ToolCallContext::new(vec![]).with_thread_id("thread-c");

        CreatePlanTool
            .call(json!({ "items": [{ "title": "step" }] }), Some(&ctx))
            .await
            .unwrap();

        let err = UpdatePlanTool
            .call(json!({ "updates": [{ "id": "nope", "status": "completed" }] }), Some(&ctx))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
