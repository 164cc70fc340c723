//! Plan-and-execute orchestration: planner, executor, replanner,
//! summarizer, and the interrupt manager that ties them to the thread
//! state machine.

pub mod executor;
pub mod interrupt;
pub mod plan;
pub mod planner;
pub mod replanner;
pub mod summarizer;

pub use executor::Executor;
pub use interrupt::InterruptManager;
pub use plan::{ExecutionPlan, ExecutionTask, InterruptData, InterruptKind, PlanExecuteState, PlanStatus, TaskStatus};
pub use planner::Planner;
pub use replanner::{ReplanDecision, ReplanRequest, Replanner};
pub use summarizer::Summarizer;

use crate::client::A2AClient;
use crate::conversation;
use crate::error::FabricResult;
use crate::llm::{LlmGateway, LlmMessage};
use crate::memory::{self, Candidate};
use crate::registry::AgentRegistry;
use crate::wire::SseEvent;

const MEMORY_TOOL_CALL_THRESHOLD: u32 = 3;
const MEMORY_AGENT_CALL_THRESHOLD: u32 = 2;

/// Bundles the collaborators a single orchestration turn needs. Built once
/// per request and borrowed by the drive loop — a short-lived owning
/// struct rather than a god object.
pub struct TurnContext<'a> {
    /// LLM gateway used by the planner, executor, and summarizer.
    pub llm: &'a dyn LlmGateway,
    /// Agent directory used by the planner and executor.
    pub registry: &'a AgentRegistry,
    /// Remote-agent client used by the executor.
    pub client: &'a A2AClient,
    /// Per-thread interrupt flags.
    pub interrupts: &'a InterruptManager,
}

/// Drive `state` forward by one executor step, honoring an active
/// interrupt for `thread_id` by stopping before dispatch — the executor
/// observes it at the next SSE yield point and stops within one task
/// boundary. A resolved interrupt is consumed and applied (retry/skip/
/// abort/modify, or a plan replace/add) before execution resumes.
pub async fn drive_one_step(ctx: &TurnContext<'_>, thread_id: &str, state: &mut PlanExecuteState) -> FabricResult<Vec<SseEvent>> {
    if let Some(resolved) = ctx.interrupts.take_resolved(thread_id).await {
        apply_resume(ctx, state, &resolved).await?;
    }

    if ctx.interrupts.is_interrupted(thread_id).await {
        return Ok(Vec::new());
    }

    let history: Vec<LlmMessage> = conversation::smart_preserve(&state.messages, 6)
        .iter()
        .filter_map(value_to_llm_message)
        .collect();

    if state.plan.is_none() {
        let planner = Planner::new(ctx.llm, ctx.registry);
        match planner.plan(&state.original_request, &history, None).await? {
            Ok(plan) => {
                let event = SseEvent::new(
                    "plan_created",
                    serde_json::json!({"plan": {"id": plan.id, "tasks": plan.tasks}}),
                );
                state.plan = Some(plan);
                return Ok(vec![event]);
            }
            Err(interrupt) => {
                raise_interrupt(ctx, state, thread_id, interrupt.kind, interrupt.reason.clone(), interrupt.context.clone()).await;
                return Ok(vec![SseEvent::new("error", serde_json::json!({"error": interrupt.reason}))]);
            }
        }
    }

    let mut plan = state.plan.take().expect("checked above");
    let executor = Executor::new(ctx.llm, ctx.registry, ctx.client);
    let (mut events, next_index) = executor
        .step(&mut plan, state.current_task_index, &state.skipped_task_indices)
        .await?;
    state.current_task_index = next_index;
    state.progress_state.completed_count = plan
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    state.progress_state.total_count = plan.task_count();
    state.messages_since_last_summary += 1;
    if !plan.tasks.iter().any(|t| t.agent == "orchestrator") {
        state.tool_calls_since_memory += 1;
    }
    if events.iter().any(|e| e.event == "task_completed" || e.event == "task_error") {
        state.agent_calls_since_memory += 1;
    }

    let task_failed = events.iter().any(|e| e.event == "task_error");
    if task_failed {
        let failed_index = next_index.saturating_sub(1);
        plan.status = PlanStatus::Interrupted;
        state.plan = Some(plan);
        raise_interrupt(
            ctx,
            state,
            thread_id,
            InterruptKind::ErrorRecovery,
            "task failed; choose retry, skip, abort, or modify",
            serde_json::json!({"task_index": failed_index}),
        )
        .await;
        return Ok(events);
    }

    plan.refresh_status();

    if plan.is_complete() {
        let summarizer = Summarizer::new(ctx.llm);
        let summary = summarizer.plan_summary(&plan).await?;
        plan.summary = Some(summary.clone());
        state.summary = Some(summary.clone());
        events.push(SseEvent::new(
            "plan_completed",
            serde_json::json!({"plan": {"id": plan.id, "tasks": plan.tasks}, "summary": summary}),
        ));
    }

    state.plan = Some(plan);

    maybe_extract_memory(ctx, state).await?;
    maybe_summarize_conversation(ctx, state, &history).await?;

    Ok(events)
}

/// Convert a persisted JSON message into an [`LlmMessage`], dropping
/// entries with no recognizable `role`/`content` pair (e.g. `tool` messages
/// carried only for pairing, not fed to the planner directly).
fn value_to_llm_message(value: &serde_json::Value) -> Option<LlmMessage> {
    let role = value.get("role")?.as_str()?;
    let content = value.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    match role {
        "system" => Some(LlmMessage::system(content.to_string())),
        "user" | "human" => Some(LlmMessage::user(content.to_string())),
        _ => None,
    }
}

async fn raise_interrupt(
    ctx: &TurnContext<'_>,
    state: &mut PlanExecuteState,
    thread_id: &str,
    kind: InterruptKind,
    reason: impl Into<String>,
    context: serde_json::Value,
) {
    ctx.interrupts.interrupt_with_context(thread_id, kind, reason, context).await;
    state.interrupted = true;
    state.interrupt_data = ctx.interrupts.get(thread_id).await;
    state.approval_pending = kind == InterruptKind::ApprovalRequest;
}

/// What a resume's `user_input` asked for.
enum ResumeAction {
    /// `"skip step N"` (1-indexed as typed by the user).
    SkipStep(usize),
    Retry,
    Abort,
    Replace(String),
    Add(String),
    None,
}

/// Parse the free-text resume input used by error-recovery and plan-
/// modification interrupts, and the generic "skip step N" pattern honored
/// regardless of interrupt kind.
fn parse_resume_action(input: &str) -> ResumeAction {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if let Some(rest) = lower.strip_prefix("skip step ") {
        if let Ok(n) = rest.trim().parse::<usize>() {
            if n >= 1 {
                return ResumeAction::SkipStep(n - 1);
            }
        }
    }
    match lower.as_str() {
        "retry" => return ResumeAction::Retry,
        "abort" => return ResumeAction::Abort,
        _ => {}
    }
    for prefix in ["modify:", "replace:"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return ResumeAction::Replace(rest.trim().to_string());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("add:") {
        return ResumeAction::Add(rest.trim().to_string());
    }
    ResumeAction::None
}

fn failed_task_index(resolved: &InterruptData) -> Option<usize> {
    resolved.context.get("task_index").and_then(|v| v.as_u64()).map(|n| n as usize)
}

/// Apply a resolved interrupt's `user_input` to `state`: skip a step,
/// retry/abort the failed task, or route a plan replace/add through the
/// [`Replanner`].
async fn apply_resume(ctx: &TurnContext<'_>, state: &mut PlanExecuteState, resolved: &InterruptData) -> FabricResult<()> {
    state.interrupted = false;
    state.interrupt_data = None;
    state.approval_pending = false;

    let Some(input) = resolved.user_input.as_deref() else {
        return Ok(());
    };

    let history: Vec<LlmMessage> = conversation::smart_preserve(&state.messages, 6)
        .iter()
        .filter_map(value_to_llm_message)
        .collect();

    match parse_resume_action(input) {
        ResumeAction::SkipStep(idx) => {
            if !state.skipped_task_indices.contains(&idx) {
                state.skipped_task_indices.push(idx);
            }
            if let Some(plan) = state.plan.as_mut() {
                plan.status = PlanStatus::Executing;
            }
        }
        ResumeAction::Retry => {
            if let Some(idx) = failed_task_index(resolved) {
                if let Some(plan) = state.plan.as_mut() {
                    if let Some(task) = plan.tasks.get_mut(idx) {
                        task.status = TaskStatus::Pending;
                        task.error = None;
                    }
                    state.current_task_index = idx;
                    plan.status = PlanStatus::Executing;
                }
            }
        }
        ResumeAction::Abort => {
            if let Some(idx) = failed_task_index(resolved) {
                if let Some(plan) = state.plan.as_mut() {
                    if let Some(task) = plan.tasks.get_mut(idx) {
                        task.status = TaskStatus::Cancelled;
                        task.completed_at = Some(chrono::Utc::now().to_rfc3339());
                    }
                    plan.refresh_status();
                }
            }
        }
        ResumeAction::Replace(description) => {
            if let Some(plan) = state.plan.as_mut() {
                let planner = Planner::new(ctx.llm, ctx.registry);
                let replanner = Replanner::new(&planner);
                let request = ReplanRequest {
                    replace_plan_requested: Some(description),
                    ..ReplanRequest::default()
                };
                replanner.replan(plan, request, &state.original_request, &history).await?;
                plan.status = PlanStatus::Executing;
            }
        }
        ResumeAction::Add(description) => {
            let planner = Planner::new(ctx.llm, ctx.registry);
            if let Ok(Ok(scratch)) = planner.plan(&description, &history, None).await {
                if let Some(plan) = state.plan.as_mut() {
                    let replanner = Replanner::new(&planner);
                    let request = ReplanRequest {
                        add_to_plan_requested: Some(scratch.tasks),
                        ..ReplanRequest::default()
                    };
                    replanner.replan(plan, request, &state.original_request, &history).await?;
                    plan.status = PlanStatus::Executing;
                }
            }
        }
        ResumeAction::None => {
            if let Some(plan) = state.plan.as_mut() {
                plan.status = PlanStatus::Executing;
            }
        }
    }

    Ok(())
}

/// Run structured-memory extraction once the per-thread trigger counters
/// cross their threshold, resetting them afterward.
async fn maybe_extract_memory(ctx: &TurnContext<'_>, state: &mut PlanExecuteState) -> FabricResult<()> {
    if state.tool_calls_since_memory < MEMORY_TOOL_CALL_THRESHOLD && state.agent_calls_since_memory < MEMORY_AGENT_CALL_THRESHOLD {
        return Ok(());
    }

    let Some(plan) = state.plan.as_ref() else {
        return Ok(());
    };
    let candidates: Vec<Candidate> = plan
        .tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Completed))
        .filter_map(|t| {
            let content = t.result.as_ref()?.get("content")?.as_str()?;
            Some(Candidate { source: t.agent.as_str(), content })
        })
        .collect();

    memory::memorize_records(ctx.llm, &mut state.memory, &candidates).await?;
    state.tool_calls_since_memory = 0;
    state.agent_calls_since_memory = 0;
    Ok(())
}

/// Run background conversation summarization once the message-count or
/// elapsed-time trigger fires, resetting the counters afterward.
async fn maybe_summarize_conversation(ctx: &TurnContext<'_>, state: &mut PlanExecuteState, history: &[LlmMessage]) -> FabricResult<()> {
    let seconds_since = state
        .last_summary_at
        .as_deref()
        .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| (chrono::Utc::now() - ts.with_timezone(&chrono::Utc)).num_seconds().max(0) as u64)
        .unwrap_or(u64::MAX);

    let summarizer = Summarizer::new(ctx.llm);
    if !summarizer.should_summarize(state.messages_since_last_summary, seconds_since) {
        return Ok(());
    }
    if history.is_empty() {
        return Ok(());
    }

    let fallback_stats = summarizer::FallbackStats {
        message_count: state.messages.len(),
        has_tool_calls: state.messages.iter().any(|m| m.get("role").and_then(|r| r.as_str()) == Some("tool")),
        agent_names: state.active_agents.clone(),
        error_count: state
            .plan
            .as_ref()
            .map(|p| p.tasks.iter().filter(|t| t.status == TaskStatus::Failed).count())
            .unwrap_or(0),
    };

    let summary = summarizer
        .summarize_conversation(history, state.summary.as_deref(), fallback_stats)
        .await?;
    state.summary = Some(summary);
    state.messages_since_last_summary = 0;
    state.last_summary_at = Some(chrono::Utc::now().to_rfc3339());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_context_borrows_not_owns() {
        // Compile-time check only: TurnContext is a borrow bundle, not a
        // god object that owns its collaborators.
        fn _assert_lifetime_bound<'a>(_: TurnContext<'a>) {}
    }
}
