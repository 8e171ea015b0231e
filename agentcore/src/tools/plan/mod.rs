//! Plan tools: `create_plan`, `update_plan`.
//!
//! Persists the active plan as JSON under XDG state home (e.g.
//! `~/.local/state/agentcore/plan-<threadId>.json` on Linux), one file per thread so
//! concurrent threads don't clobber each other. Adapted from the todo-list tools'
//! XDG persistence pattern, generalized to the richer `Plan`/`PlanItem` model.

mod create_plan;
mod update_plan;

pub use create_plan::{CreatePlanTool, TOOL_CREATE_PLAN};
pub use update_plan::{UpdatePlanTool, TOOL_UPDATE_PLAN};

use crate::conversation::Plan;
use crate::tool_source::ToolSourceError;

const XDG_APP_NAME: &str = "agentcore";

/// Path to the persisted plan for a given thread (falls back to `"default"` when
/// no thread id is available, e.g. a one-off CLI run with no session).
fn plan_file_path(thread_id: Option<&str>) -> Result<std::path::PathBuf, ToolSourceError> {
    let base = cross_xdg::BaseDirs::new()
        .map_err(|e| ToolSourceError::InvalidInput(format!("XDG base dirs unavailable: {}", e)))?;
    let file_name = format!("plan-{}.json", thread_id.unwrap_or("default"));
    Ok(base.state_home().join(XDG_APP_NAME).join(file_name))
}

fn load_plan(thread_id: Option<&str>) -> Result<Option<Plan>, ToolSourceError> {
    let path = plan_file_path(thread_id)?;
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| ToolSourceError::Internal(format!("reading plan file: {}", e)))?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ToolSourceError::Internal(format!("parsing plan file: {}", e)))
}

fn save_plan(thread_id: Option<&str>, plan: &Plan) -> Result<(), ToolSourceError> {
    let path = plan_file_path(thread_id)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ToolSourceError::Internal(format!("creating plan dir: {}", e)))?;
    }
    let raw = serde_json::to_string_pretty(plan)
        .map_err(|e| ToolSourceError::Internal(format!("serializing plan: {}", e)))?;
    std::fs::write(&path, raw).map_err(|e| ToolSourceError::Internal(format!("writing plan file: {}", e)))
}

/// Renders a plan as a checklist the model (and a human reading the transcript) can
/// scan at a glance: `[x]`/`[~]`/`[ ]` per item.
fn render_plan(plan: &Plan) -> String {
    let mut out = format!("Plan ({:?}):\n", plan.status);
    for item in &plan.items {
        let marker = match item.status {
            crate::conversation::PlanItemStatus::Completed => "x",
            crate::conversation::PlanItemStatus::InProgress => "~",
            crate::conversation::PlanItemStatus::Pending => " ",
        };
        out.push_str(&format!("[{}] {} ({})\n", marker, item.title, item.id));
    }
    out
}

#[cfg(test)]
pub(crate) static XDG_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{PlanItem, PlanItemStatus};

    #[test]
    fn plan_file_path_scopes_by_thread_id() {
        let _g = XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let path = plan_file_path(Some("abc")).unwrap();
        assert_eq!(path.file_name().unwrap(), "plan-abc.json");
    }

    #[test]
    fn save_then_load_plan_roundtrips() {
        let _g = XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        let plan = Plan::new(vec![PlanItem {
            id: "1".to_string(),
            title: "step one".to_string(),
            status: PlanItemStatus::Pending,
            description: None,
        }]);
        save_plan(Some("t1"), &plan).unwrap();
        let loaded = load_plan(Some("t1")).unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].title, "step one");
    }

    #[test]
    fn load_plan_missing_file_returns_none() {
        let _g = XDG_TEST_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_STATE_HOME", dir.path());
        assert!(load_plan(Some("nonexistent-thread")).unwrap().is_none());
    }
}
