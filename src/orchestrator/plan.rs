//! Plan/execution data types, grounded on
//! `original_source/src/orchestrator/plan_execute_state.py`'s
//! `ExecutionTask`/`ExecutionPlan`/`ProgressState`/`InterruptData`/
//! `PlanExecuteState` dataclasses.

use crate::config::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a single plan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet dispatched.
    Pending,
    /// Dispatch is underway.
    InProgress,
    /// Skipped because it could never become executable.
    Skipped,
    /// Dispatched and finished successfully.
    Completed,
    /// Dispatched and finished with an error.
    Failed,
    /// Abandoned by an error-recovery "abort" decision; never retried.
    Cancelled,
}

/// A single step of an [`ExecutionPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTask {
    /// Stable id, `task_<n>`.
    pub id: String,
    /// Free-text instruction content.
    pub content: String,
    /// Agent name responsible for this task, or `"orchestrator"`.
    pub agent: String,
    /// Ids of tasks that must be `completed`/`skipped` before this one runs.
    pub depends_on: Vec<String>,
    /// Current status.
    pub status: TaskStatus,
    /// RFC3339 completion timestamp, set on completed/failed.
    pub completed_at: Option<String>,
    /// Structured result, set on completion.
    pub result: Option<serde_json::Value>,
    /// Error message, set on failure.
    pub error: Option<String>,
    /// Retry budget carried for forward-compatibility; not consumed by
    /// this crate's executor (see design notes).
    pub max_retries: u32,
}

/// Lifecycle status of an [`ExecutionPlan`] as a whole, independent of the
/// per-task [`TaskStatus`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Produced by the planner; execution has not started.
    Planning,
    /// At least one task has been dispatched.
    Executing,
    /// Paused pending explicit user approval.
    Paused,
    /// Stopped for a user escape, error recovery, or plan-modification choice.
    Interrupted,
    /// Every task reached `completed`/`skipped`, none `failed`/`cancelled`.
    Completed,
    /// Terminal with at least one `failed` task.
    Failed,
    /// Terminal with at least one `cancelled` task and no `failed` ones.
    Cancelled,
}

/// An ordered, versioned sequence of [`ExecutionTask`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Unique plan id.
    pub id: String,
    /// The user request this plan was produced for.
    pub original_request: String,
    /// Tasks in creation order (not necessarily execution order).
    pub tasks: Vec<ExecutionTask>,
    /// Current lifecycle status.
    pub status: PlanStatus,
    /// Monotonically increasing version, bumped on every modification.
    pub version: u32,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last mutation.
    pub updated_at: String,
    /// Caller-opaque metadata, never interpreted by the orchestrator.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Executive summary, set once the plan completes.
    #[serde(default)]
    pub summary: Option<String>,
}

impl ExecutionPlan {
    /// Build a fresh plan in `planning` status.
    pub fn new(id: impl Into<String>, original_request: impl Into<String>, tasks: Vec<ExecutionTask>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        ExecutionPlan {
            id: id.into(),
            original_request: original_request.into(),
            tasks,
            status: PlanStatus::Planning,
            version: 1,
            created_at: now.clone(),
            updated_at: now,
            metadata: serde_json::json!({}),
            summary: None,
        }
    }

    /// Stamp `updated_at` to now, called on every mutation.
    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// `true` once every task is `completed`, `failed`, `skipped`, or
    /// `cancelled` — i.e. no task can make further progress.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| {
            matches!(
                t.status,
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
            )
        })
    }

    /// Recompute `status` from the current task statuses. Call after any
    /// task mutation that might change completion; a no-op while an
    /// interrupt or pause is in effect (callers set those explicitly).
    pub fn refresh_status(&mut self) {
        if matches!(self.status, PlanStatus::Interrupted | PlanStatus::Paused) {
            return;
        }
        if self.is_complete() {
            self.status = if self.tasks.iter().any(|t| t.status == TaskStatus::Failed) {
                PlanStatus::Failed
            } else if self.tasks.iter().any(|t| t.status == TaskStatus::Cancelled) {
                PlanStatus::Cancelled
            } else {
                PlanStatus::Completed
            };
        } else if self.tasks.iter().any(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Completed | TaskStatus::Failed)) {
            self.status = PlanStatus::Executing;
        }
        self.touch();
    }

    /// Number of tasks in the plan.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Two-pass executable-task scan: mark stuck `skipped_task_indices`
    /// entries as skipped, compute satisfied ids from completed+skipped
    /// statuses, then scan from `current_task_index` forward, wrapping to
    /// `0..current_task_index`.
    pub fn next_executable_task(&mut self, current_task_index: usize, skipped_task_indices: &[usize]) -> Option<usize> {
        for &idx in skipped_task_indices {
            if let Some(task) = self.tasks.get_mut(idx) {
                if task.status == TaskStatus::Pending {
                    task.status = TaskStatus::Skipped;
                }
            }
        }

        let satisfied: std::collections::HashSet<&str> = self
            .tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Skipped))
            .map(|t| t.id.as_str())
            .collect();

        let is_executable = |task: &ExecutionTask| {
            task.status == TaskStatus::Pending
                && task.depends_on.iter().all(|dep| satisfied.contains(dep.as_str()))
        };

        let n = self.tasks.len();
        if n == 0 {
            return None;
        }
        let start = current_task_index.min(n);

        for i in start..n {
            if is_executable(&self.tasks[i]) {
                return Some(i);
            }
        }
        for i in 0..start {
            if is_executable(&self.tasks[i]) {
                return Some(i);
            }
        }
        None
    }

    /// Insert freshly created pending tasks after `insert_after_step`
    /// (`None` appends), bump `version`. Never touches completed/failed
    /// tasks.
    pub fn add_tasks(&mut self, new_tasks: Vec<ExecutionTask>, insert_after_step: Option<usize>) {
        let at = match insert_after_step {
            Some(idx) if idx + 1 <= self.tasks.len() => idx + 1,
            _ => self.tasks.len(),
        };
        for (offset, task) in new_tasks.into_iter().enumerate() {
            self.tasks.insert(at + offset, task);
        }
        self.version += 1;
        self.touch();
    }

    /// Build a brief executive summary from completed/failed task contents
    /// and results (multi-task case).
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Completed => {
                    let result = task
                        .result
                        .as_ref()
                        .and_then(|r| r.get("content"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("(no content)");
                    lines.push(format!("- {}: {}", task.content, result));
                }
                TaskStatus::Failed => {
                    lines.push(format!(
                        "- {}: FAILED ({})",
                        task.content,
                        task.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                _ => {}
            }
        }
        lines.join("\n")
    }
}

/// Kind of an active interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptKind {
    /// ESC from the UI.
    UserEscape,
    /// Replanner should add-to or replace the plan.
    PlanModification,
    /// Executor is paused pending explicit user approval.
    ApprovalRequest,
    /// A task failed and the user must choose retry/skip/abort/modify.
    ErrorRecovery,
    /// Execution paused for a reason outside the above categories.
    ManualPause,
}

/// An active or resolved interrupt for a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptData {
    /// What triggered the interrupt.
    pub kind: InterruptKind,
    /// Human-readable reason.
    pub reason: String,
    /// Arbitrary context captured at interrupt time.
    pub context: serde_json::Value,
    /// User-supplied input used to resolve the interrupt, once provided.
    pub user_input: Option<String>,
    /// `true` while an `approval_request` awaits a decision.
    pub pending_approval: bool,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 resolution timestamp, set when cleared.
    pub resolved_at: Option<String>,
}

/// Progress reporting state surfaced to SSE/WS consumers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Index of the task currently executing, if any.
    pub current_task_index: Option<usize>,
    /// Tasks completed so far.
    pub completed_count: usize,
    /// Total tasks in the active plan.
    pub total_count: usize,
}

/// UI verbosity mode requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Minimal event stream.
    Simple,
    /// Full per-task progress stream.
    Progressive,
}

/// Structured memory collections, merged by id within each.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredMemory {
    /// Account records, keyed by external id.
    pub accounts: HashMap<String, serde_json::Value>,
    /// Contact records.
    pub contacts: HashMap<String, serde_json::Value>,
    /// Opportunity records.
    pub opportunities: HashMap<String, serde_json::Value>,
    /// Case records.
    pub cases: HashMap<String, serde_json::Value>,
    /// Task records.
    pub tasks: HashMap<String, serde_json::Value>,
    /// Lead records.
    pub leads: HashMap<String, serde_json::Value>,
}

/// Durable per-thread orchestration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanExecuteState {
    /// Ordered message history.
    pub messages: Vec<serde_json::Value>,
    /// The original user request that started this thread.
    pub original_request: String,
    /// Active plan, if a planning cycle has produced one.
    pub plan: Option<ExecutionPlan>,
    /// Index the executor scans from next.
    pub current_task_index: usize,
    /// Indices that should be treated as unreachable and marked skipped.
    pub skipped_task_indices: Vec<usize>,
    /// Prior plan versions, retained for audit.
    pub plan_history: Vec<ExecutionPlan>,
    /// Per-task results, keyed by task id.
    pub task_results: HashMap<String, serde_json::Value>,
    /// Free-form execution context threaded between tasks.
    pub execution_context: serde_json::Value,
    /// Per-agent context carried across calls.
    pub agent_context: HashMap<String, serde_json::Value>,
    /// `true` while an interrupt is active.
    pub interrupted: bool,
    /// Active interrupt detail, if `interrupted`.
    pub interrupt_data: Option<InterruptData>,
    /// `true` while an `approval_request` awaits resolution.
    pub approval_pending: bool,
    /// Progress reporting snapshot.
    pub progress_state: ProgressState,
    /// Requested UI verbosity.
    pub ui_mode: UiMode,
    /// Latest conversation summary, if generated.
    pub summary: Option<String>,
    /// Structured memory extracted from tool results.
    pub memory: StructuredMemory,
    /// Tool calls observed since the last memory extraction pass.
    pub tool_calls_since_memory: u32,
    /// Agent calls observed since the last memory extraction pass.
    pub agent_calls_since_memory: u32,
    /// Names of agents active in this thread.
    pub active_agents: Vec<String>,
    /// RFC3339 timestamp of the last agent interaction.
    pub last_agent_interaction: Option<String>,
    /// Messages appended since the last conversation summary.
    pub messages_since_last_summary: u32,
    /// RFC3339 timestamp of the last conversation summary, if any.
    pub last_summary_at: Option<String>,
}

impl PlanExecuteState {
    /// A fresh state for a brand-new thread.
    pub fn new(original_request: impl Into<String>, config: &OrchestratorConfig) -> Self {
        let _ = config;
        PlanExecuteState {
            messages: Vec::new(),
            original_request: original_request.into(),
            plan: None,
            current_task_index: 0,
            skipped_task_indices: Vec::new(),
            plan_history: Vec::new(),
            task_results: HashMap::new(),
            execution_context: serde_json::json!({}),
            agent_context: HashMap::new(),
            interrupted: false,
            interrupt_data: None,
            approval_pending: false,
            progress_state: ProgressState::default(),
            ui_mode: UiMode::Simple,
            summary: None,
            memory: StructuredMemory::default(),
            tool_calls_since_memory: 0,
            agent_calls_since_memory: 0,
            active_agents: Vec::new(),
            last_agent_interaction: None,
            messages_since_last_summary: 0,
            last_summary_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(serde_json::to_value(TaskStatus::Cancelled).unwrap(), "cancelled");
        assert_eq!(serde_json::to_value(TaskStatus::Pending).unwrap(), "pending");
    }

    fn task(id: &str, deps: &[&str], status: TaskStatus) -> ExecutionTask {
        ExecutionTask {
            id: id.to_string(),
            content: format!("do {id}"),
            agent: "orchestrator".to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            status,
            completed_at: None,
            result: None,
            error: None,
            max_retries: 0,
        }
    }

    #[test]
    fn next_executable_respects_dependencies() {
        let mut plan = ExecutionPlan::new(
            "p1",
            "req",
            vec![
                task("task_1", &[], TaskStatus::Completed),
                task("task_2", &["task_1"], TaskStatus::Pending),
                task("task_3", &["task_2"], TaskStatus::Pending),
            ],
        );
        let next = plan.next_executable_task(0, &[]);
        assert_eq!(next, Some(1));
    }

    #[test]
    fn scan_wraps_around_current_index() {
        let mut plan = ExecutionPlan::new(
            "p1",
            "req",
            vec![
                task("task_1", &[], TaskStatus::Pending),
                task("task_2", &[], TaskStatus::Completed),
                task("task_3", &[], TaskStatus::Completed),
            ],
        );
        // Scanning from index 1 onward finds nothing pending until wrap to 0.
        let next = plan.next_executable_task(1, &[]);
        assert_eq!(next, Some(0));
    }

    #[test]
    fn stuck_indices_become_skipped_and_unblock_dependents() {
        let mut plan = ExecutionPlan::new(
            "p1",
            "req",
            vec![
                task("task_1", &[], TaskStatus::Pending),
                task("task_2", &["task_1"], TaskStatus::Pending),
            ],
        );
        let next = plan.next_executable_task(0, &[0]);
        assert_eq!(plan.tasks[0].status, TaskStatus::Skipped);
        assert_eq!(next, Some(1));
    }

    #[test]
    fn plan_complete_when_all_completed_or_skipped() {
        let plan = ExecutionPlan::new(
            "p1",
            "req",
            vec![
                task("task_1", &[], TaskStatus::Completed),
                task("task_2", &[], TaskStatus::Skipped),
            ],
        );
        assert!(plan.is_complete());
    }

    #[test]
    fn plan_complete_when_failed_or_cancelled() {
        let plan = ExecutionPlan::new(
            "p1",
            "req",
            vec![
                task("task_1", &[], TaskStatus::Failed),
                task("task_2", &[], TaskStatus::Cancelled),
            ],
        );
        assert!(plan.is_complete());
    }

    #[test]
    fn plan_not_complete_while_in_progress() {
        let plan = ExecutionPlan::new("p1", "req", vec![task("task_1", &[], TaskStatus::InProgress)]);
        assert!(!plan.is_complete());
    }

    #[test]
    fn add_tasks_bumps_version_and_inserts_after_step() {
        let mut plan = ExecutionPlan::new("p1", "req", vec![task("task_1", &[], TaskStatus::Completed)]);
        plan.add_tasks(vec![task("task_2", &[], TaskStatus::Pending)], Some(0));
        assert_eq!(plan.version, 2);
        assert_eq!(plan.tasks[1].id, "task_2");
    }

    #[test]
    fn refresh_status_tracks_task_progress() {
        let mut plan = ExecutionPlan::new("p1", "req", vec![task("task_1", &[], TaskStatus::Pending)]);
        assert_eq!(plan.status, PlanStatus::Planning);

        plan.tasks[0].status = TaskStatus::InProgress;
        plan.refresh_status();
        assert_eq!(plan.status, PlanStatus::Executing);

        plan.tasks[0].status = TaskStatus::Failed;
        plan.refresh_status();
        assert_eq!(plan.status, PlanStatus::Failed);
    }
}
