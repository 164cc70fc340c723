//! Planner (C11): turns a user request + registry capabilities into an
//! [`ExecutionPlan`] by prompting the LLM gateway and parsing its numbered-
//! list response. Grounded on
//! `original_source/src/orchestrator/plan_execute_state.py`'s plan-shape
//! conventions; the parser is a hand-rolled `str`-based scanner rather
//! than a regex dependency, keeping parsing lightweight.

use super::plan::{ExecutionPlan, ExecutionTask, InterruptData, InterruptKind, TaskStatus};
use crate::error::FabricResult;
use crate::llm::{InvokeOptions, LlmGateway, LlmMessage};
use crate::registry::AgentRegistry;

/// Builds plans from LLM output.
pub struct Planner<'a> {
    llm: &'a dyn LlmGateway,
    registry: &'a AgentRegistry,
}

impl<'a> Planner<'a> {
    /// Build a planner over the given gateway and registry.
    pub fn new(llm: &'a dyn LlmGateway, registry: &'a AgentRegistry) -> Self {
        Planner { llm, registry }
    }

    /// Produce a plan for `original_request`, given `history` (prior
    /// conversation) and an existing plan, if any.
    pub async fn plan(
        &self,
        original_request: &str,
        history: &[LlmMessage],
        existing_plan: Option<&ExecutionPlan>,
    ) -> FabricResult<Result<ExecutionPlan, InterruptData>> {
        if let Some(plan) = existing_plan {
            if !plan.is_complete() {
                return Ok(Ok(plan.clone()));
            }
        }

        let stats = self.registry.stats().await;
        let system = format!(
            "You are a task planner. Available agents and capabilities: {:?}. \
             Produce a numbered list of steps, one per line, in the form: \
             'N. <content> (Agent: <name>[, depends on: <nums>])'.",
            stats.capabilities
        );

        let mut messages = vec![LlmMessage::system(system)];
        messages.extend_from_slice(history);
        messages.push(LlmMessage::user(original_request.to_string()));

        let response = self.llm.invoke(&messages, InvokeOptions::default()).await?;
        let tasks = parse_plan_response(&response);

        if tasks.is_empty() {
            return Ok(Err(InterruptData {
                kind: InterruptKind::ErrorRecovery,
                reason: "planner produced no parseable steps".to_string(),
                context: serde_json::json!({"raw_response": response}),
                user_input: None,
                pending_approval: false,
                created_at: String::new(),
                resolved_at: None,
            }));
        }

        Ok(Ok(ExecutionPlan::new(uuid::Uuid::new_v4().to_string(), original_request, tasks)))
    }
}

/// Parse a numbered-list LLM response into tasks. Lines that don't match
/// the `N. <content> (Agent: <name>[, depends on: <nums>])` grammar are
/// skipped.
fn parse_plan_response(response: &str) -> Vec<ExecutionTask> {
    let mut tasks = Vec::new();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(dot) = line.find('.') else { continue };
        let (number_part, rest) = line.split_at(dot);
        if number_part.trim().parse::<u32>().is_err() {
            continue;
        }
        let rest = rest[1..].trim();

        let Some(paren_start) = rest.rfind('(') else { continue };
        if !rest.ends_with(')') {
            continue;
        }
        let content = rest[..paren_start].trim().to_string();
        let annotation = &rest[paren_start + 1..rest.len() - 1];

        let Some(agent_marker) = annotation.find("Agent:") else { continue };
        let after_agent = annotation[agent_marker + "Agent:".len()..].trim();

        let (agent, depends_on) = match after_agent.find(',') {
            Some(comma) => {
                let agent = after_agent[..comma].trim().to_string();
                let deps_part = after_agent[comma + 1..].trim();
                let deps = deps_part
                    .trim_start_matches("depends on:")
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| s.parse::<u32>().ok())
                    .map(|n| format!("task_{n}"))
                    .collect();
                (agent, deps)
            }
            None => (after_agent.to_string(), Vec::new()),
        };

        let n = tasks.len() as u32 + 1;
        tasks.push(ExecutionTask {
            id: format!("task_{n}"),
            content,
            agent: if agent.is_empty() { "orchestrator".to_string() } else { agent },
            depends_on,
            status: TaskStatus::Pending,
            completed_at: None,
            result: None,
            error: None,
            max_retries: 0,
        });
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_numbered_list() {
        let response = "1. Look up the account (Agent: salesforce)\n\
                         2. Summarize findings (Agent: orchestrator, depends on: 1)";
        let tasks = parse_plan_response(response);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "task_1");
        assert_eq!(tasks[0].agent, "salesforce");
        assert!(tasks[0].depends_on.is_empty());
        assert_eq!(tasks[1].depends_on, vec!["task_1".to_string()]);
    }

    #[test]
    fn skips_unparseable_lines() {
        let response = "Here is the plan:\n1. Do the thing (Agent: orchestrator)\nSome trailing remark.";
        let tasks = parse_plan_response(response);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn defaults_to_orchestrator_when_agent_unspecified() {
        let tasks = parse_plan_response("1. Do a thing (Agent: )");
        assert_eq!(tasks[0].agent, "orchestrator");
    }
}
