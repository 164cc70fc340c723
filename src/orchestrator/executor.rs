//! Executor (C12): picks the next executable task, dispatches it to the
//! LLM gateway or a remote agent, and persists the result.

use super::plan::{ExecutionPlan, ExecutionTask, TaskStatus};
use crate::client::A2AClient;
use crate::error::FabricResult;
use crate::llm::{InvokeOptions, LlmGateway, LlmMessage};
use crate::registry::AgentRegistry;
use crate::wire::{A2ATask, SseEvent};
use uuid::Uuid;

/// Dispatches individual plan tasks.
pub struct Executor<'a> {
    llm: &'a dyn LlmGateway,
    registry: &'a AgentRegistry,
    client: &'a A2AClient,
}

impl<'a> Executor<'a> {
    /// Build an executor over the given collaborators.
    pub fn new(llm: &'a dyn LlmGateway, registry: &'a AgentRegistry, client: &'a A2AClient) -> Self {
        Executor { llm, registry, client }
    }

    /// Advance `plan` by one step: find the next executable task via the
    /// two-pass scan, dispatch it, and write back its result. Returns the
    /// SSE events to emit and the updated index to resume scanning from.
    pub async fn step(
        &self,
        plan: &mut ExecutionPlan,
        current_task_index: usize,
        skipped_task_indices: &[usize],
    ) -> FabricResult<(Vec<SseEvent>, usize)> {
        let Some(idx) = plan.next_executable_task(current_task_index, skipped_task_indices) else {
            return Ok((Vec::new(), current_task_index));
        };

        let mut events = vec![SseEvent::new(
            "task_started",
            serde_json::json!({"task": {"id": plan.tasks[idx].id, "content": plan.tasks[idx].content}}),
        )];

        plan.tasks[idx].status = TaskStatus::InProgress;
        let outcome = self.dispatch(&plan.tasks[idx]).await;
        let task = &mut plan.tasks[idx];
        match outcome {
            Ok(content) => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(chrono::Utc::now().to_rfc3339());
                task.result = Some(serde_json::json!({"content": content}));
                events.push(SseEvent::new(
                    "task_completed",
                    serde_json::json!({"task_id": task.id, "success": true, "content": task.result}),
                ));
            }
            Err(err) => {
                task.status = TaskStatus::Failed;
                task.completed_at = Some(chrono::Utc::now().to_rfc3339());
                task.error = Some(err.to_string());
                events.push(SseEvent::new(
                    "task_error",
                    serde_json::json!({"task_id": task.id, "error": err.to_string(), "content": serde_json::Value::Null}),
                ));
            }
        }

        Ok((events, idx + 1))
    }

    async fn dispatch(&self, task: &ExecutionTask) -> FabricResult<String> {
        if task.agent == "orchestrator" {
            let messages = vec![LlmMessage::user(task.content.clone())];
            return self.llm.invoke(&messages, InvokeOptions::default()).await;
        }

        let capability = format!("{}_operations", task.agent);
        let agent = match self.registry.find_by_capability(&capability).await.into_iter().next() {
            Some(a) => a,
            None => self
                .registry
                .get_by_name(&task.agent)
                .await
                .ok_or_else(|| crate::error::OrchestratorError::state(format!("no agent found for {}", task.agent)))?,
        };

        let wire_task = A2ATask {
            id: Uuid::new_v4().to_string(),
            instruction: task.content.clone(),
            context: serde_json::json!({}),
            state_snapshot: serde_json::json!({}),
        };

        let result = self.client.process_task(&agent.endpoint, wire_task).await?;
        let content = result
            .artifacts
            .first()
            .map(|a| a.content.clone())
            .unwrap_or_default();

        if content.starts_with("Error:") || result.error.is_some() {
            return Err(crate::error::OrchestratorError::remote(
                result.error.unwrap_or(content),
            ));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::plan::ExecutionTask;

    fn task(id: &str, agent: &str) -> ExecutionTask {
        ExecutionTask {
            id: id.to_string(),
            content: "do it".to_string(),
            agent: agent.to_string(),
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            completed_at: None,
            result: None,
            error: None,
            max_retries: 0,
        }
    }

    #[test]
    fn remote_content_with_error_prefix_is_treated_as_failure() {
        let content = "Error: could not reach CRM";
        assert!(content.starts_with("Error:"));
    }

    #[test]
    fn orchestrator_task_routes_to_llm_not_registry() {
        let t = task("task_1", "orchestrator");
        assert_eq!(t.agent, "orchestrator");
    }
}
