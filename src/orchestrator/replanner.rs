//! Replanner (C13): decides, after each executor step, whether to route to
//! the summarizer, apply a plan replacement/addition, or continue.

use super::plan::{ExecutionPlan, ExecutionTask};
use super::planner::Planner;
use crate::error::FabricResult;
use crate::llm::LlmMessage;

/// Outcome of a replanning decision.
pub enum ReplanDecision {
    /// Plan is complete; route to the summarizer.
    Complete,
    /// Plan was replaced wholesale with a fresh one.
    Replaced(ExecutionPlan),
    /// New tasks were appended/inserted into the existing plan.
    Modified,
    /// No change; continue executing the current plan.
    Continue,
}

/// Optional mid-execution plan mutation requests, mirroring the two flags
/// an interrupt handler can set on the thread state.
#[derive(Debug, Clone, Default)]
pub struct ReplanRequest {
    /// Description for a brand-new plan that should replace the current one.
    pub replace_plan_requested: Option<String>,
    /// New steps to splice into the current plan.
    pub add_to_plan_requested: Option<Vec<ExecutionTask>>,
    /// Index after which `add_to_plan_requested` tasks are inserted.
    pub insert_after_step: Option<usize>,
}

/// Applies replanning decisions against an in-flight plan.
pub struct Replanner<'a> {
    planner: &'a Planner<'a>,
}

impl<'a> Replanner<'a> {
    /// Build a replanner delegating fresh-plan generation to `planner`.
    pub fn new(planner: &'a Planner<'a>) -> Self {
        Replanner { planner }
    }

    /// Decide what to do with `plan` given `request`. Completed and
    /// failed tasks are never touched; plan `version` strictly increases on
    /// any modification.
    pub async fn replan(
        &self,
        plan: &mut ExecutionPlan,
        request: ReplanRequest,
        original_request: &str,
        history: &[LlmMessage],
    ) -> FabricResult<ReplanDecision> {
        if plan.is_complete() && request.replace_plan_requested.is_none() {
            return Ok(ReplanDecision::Complete);
        }

        if let Some(description) = request.replace_plan_requested {
            match self.planner.plan(&description, history, None).await? {
                Ok(mut new_plan) => {
                    new_plan.version = plan.version + 1;
                    *plan = new_plan.clone();
                    return Ok(ReplanDecision::Replaced(new_plan));
                }
                Err(_interrupt) => return Ok(ReplanDecision::Continue),
            }
        }

        if let Some(new_tasks) = request.add_to_plan_requested {
            plan.add_tasks(new_tasks, request.insert_after_step);
            plan.refresh_status();
            return Ok(ReplanDecision::Modified);
        }

        let _ = original_request;
        Ok(ReplanDecision::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::plan::TaskStatus;

    fn completed_task(id: &str) -> ExecutionTask {
        ExecutionTask {
            id: id.to_string(),
            content: "done".to_string(),
            agent: "orchestrator".to_string(),
            depends_on: Vec::new(),
            status: TaskStatus::Completed,
            completed_at: Some("2026-01-01T00:00:00Z".to_string()),
            result: Some(serde_json::json!({"content": "ok"})),
            error: None,
            max_retries: 0,
        }
    }

    #[test]
    fn completed_and_failed_tasks_survive_add_tasks() {
        let mut plan = ExecutionPlan::new("p1", "req", vec![completed_task("task_1")]);
        plan.add_tasks(
            vec![ExecutionTask {
                id: "task_2".to_string(),
                content: "new step".to_string(),
                agent: "orchestrator".to_string(),
                depends_on: vec![],
                status: TaskStatus::Pending,
                completed_at: None,
                result: None,
                error: None,
                max_retries: 0,
            }],
            Some(0),
        );
        assert_eq!(plan.tasks[0].status, TaskStatus::Completed);
        assert_eq!(plan.version, 2);
    }
}
