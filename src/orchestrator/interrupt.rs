//! Interrupt manager (C15): per-thread interrupt flags observed by the
//! executor at SSE yield points, and the resume path that injects a new
//! human message to drive replanning.

use super::plan::{InterruptData, InterruptKind};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Per-thread interrupt registry. At most one active interrupt per thread.
pub struct InterruptManager {
    active: Mutex<HashMap<String, InterruptData>>,
}

impl Default for InterruptManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptManager {
    /// Build an empty registry.
    pub fn new() -> Self {
        InterruptManager {
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Set the interrupt flag for `thread_id` (ESC from UI, or any other
    /// trigger). Overwrites any existing unresolved interrupt for the
    /// thread — only one may be active at a time.
    pub async fn interrupt(&self, thread_id: &str, kind: InterruptKind, reason: impl Into<String>) {
        self.interrupt_with_context(thread_id, kind, reason, serde_json::json!({})).await;
    }

    /// Like [`Self::interrupt`], but attaches structured `context` captured
    /// at interrupt time (e.g. the failed task's index for `error_recovery`).
    pub async fn interrupt_with_context(
        &self,
        thread_id: &str,
        kind: InterruptKind,
        reason: impl Into<String>,
        context: serde_json::Value,
    ) {
        let mut guard = self.active.lock().await;
        guard.insert(
            thread_id.to_string(),
            InterruptData {
                kind,
                reason: reason.into(),
                context,
                user_input: None,
                pending_approval: kind == InterruptKind::ApprovalRequest,
                created_at: chrono::Utc::now().to_rfc3339(),
                resolved_at: None,
            },
        );
    }

    /// `true` if the executor should stop at the next yield point for
    /// `thread_id`.
    pub async fn is_interrupted(&self, thread_id: &str) -> bool {
        self.active
            .lock()
            .await
            .get(thread_id)
            .map(|i| i.resolved_at.is_none())
            .unwrap_or(false)
    }

    /// Clear the interrupt flag and record the user input that resolved it,
    /// to be injected as a new human message driving replanning.
    pub async fn resume(&self, thread_id: &str, user_input: impl Into<String>) -> Option<InterruptData> {
        let mut guard = self.active.lock().await;
        if let Some(interrupt) = guard.get_mut(thread_id) {
            interrupt.user_input = Some(user_input.into());
            interrupt.resolved_at = Some(chrono::Utc::now().to_rfc3339());
            return Some(interrupt.clone());
        }
        None
    }

    /// Current interrupt detail for `thread_id`, if any (resolved or not).
    pub async fn get(&self, thread_id: &str) -> Option<InterruptData> {
        self.active.lock().await.get(thread_id).cloned()
    }

    /// Remove and return `thread_id`'s interrupt if it has been resolved by
    /// [`Self::resume`]. Consumes the entry so a resolved interrupt is
    /// applied exactly once by the drive loop.
    pub async fn take_resolved(&self, thread_id: &str) -> Option<InterruptData> {
        let mut guard = self.active.lock().await;
        let resolved = guard.get(thread_id).map(|i| i.resolved_at.is_some()).unwrap_or(false);
        if resolved {
            guard.remove(thread_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupt_then_resume_clears_flag() {
        let manager = InterruptManager::new();
        manager.interrupt("t1", InterruptKind::UserEscape, "user pressed escape").await;
        assert!(manager.is_interrupted("t1").await);

        let resolved = manager.resume("t1", "please continue with step 2").await;
        assert!(resolved.is_some());
        assert!(!manager.is_interrupted("t1").await);
    }

    #[tokio::test]
    async fn approval_request_marks_pending_approval() {
        let manager = InterruptManager::new();
        manager
            .interrupt("t1", InterruptKind::ApprovalRequest, "confirm deletion")
            .await;
        let data = manager.get("t1").await.unwrap();
        assert!(data.pending_approval);
    }

    #[tokio::test]
    async fn unknown_thread_is_not_interrupted() {
        let manager = InterruptManager::new();
        assert!(!manager.is_interrupted("missing").await);
    }

    #[tokio::test]
    async fn take_resolved_consumes_the_entry_once() {
        let manager = InterruptManager::new();
        manager.interrupt("t1", InterruptKind::ErrorRecovery, "task failed").await;
        assert!(manager.take_resolved("t1").await.is_none());

        manager.resume("t1", "retry").await;
        let taken = manager.take_resolved("t1").await;
        assert!(taken.is_some());
        assert!(manager.take_resolved("t1").await.is_none());
        assert!(manager.get("t1").await.is_none());
    }

    #[tokio::test]
    async fn interrupt_with_context_carries_structured_payload() {
        let manager = InterruptManager::new();
        manager
            .interrupt_with_context(
                "t1",
                InterruptKind::ErrorRecovery,
                "task failed",
                serde_json::json!({"task_index": 2}),
            )
            .await;
        let data = manager.get("t1").await.unwrap();
        assert_eq!(data.context["task_index"], 2);
    }
}
