//! Summarizer (C14): plan summaries (executive brief over completed/failed
//! tasks) and background conversation summaries with a format guard and
//! deterministic fallback. Grounded on
//! `original_source/src/orchestrator/background_tasks.py`'s
//! `summarize_conversation`.

use super::plan::ExecutionPlan;
use crate::error::FabricResult;
use crate::llm::{InvokeOptions, LlmGateway, LlmMessage};

const REQUIRED_SECTIONS: [&str; 3] = [
    "TECHNICAL/SYSTEM INFORMATION:",
    "USER INTERACTION:",
    "AGENT COORDINATION CONTEXT:",
];

/// Builds plan and conversation summaries.
pub struct Summarizer<'a> {
    llm: &'a dyn LlmGateway,
}

impl<'a> Summarizer<'a> {
    /// Build a summarizer over the given gateway.
    pub fn new(llm: &'a dyn LlmGateway) -> Self {
        Summarizer { llm }
    }

    /// Plan summary: for a single-task plan, the raw response of
    /// that task; for multi-task plans, an LLM-generated executive brief.
    pub async fn plan_summary(&self, plan: &ExecutionPlan) -> FabricResult<String> {
        if plan.task_count() <= 1 {
            return Ok(plan
                .tasks
                .first()
                .and_then(|t| t.result.as_ref())
                .and_then(|r| r.get("content"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string());
        }

        let brief = plan.summary();
        let messages = vec![
            LlmMessage::system("Write a concise executive summary of the completed plan below."),
            LlmMessage::user(brief),
        ];
        self.llm.invoke(&messages, InvokeOptions::default()).await
    }

    /// Background conversation summary trigger: `true` iff `messages_since >=
    /// 3` or `seconds_since >= 180`.
    pub fn should_summarize(&self, messages_since_last_summary: u32, seconds_since_last_summary: u64) -> bool {
        messages_since_last_summary >= 3 || seconds_since_last_summary >= 180
    }

    /// Summarize the conversation deterministically (temperature 0, top_p
    /// 0.1), validating the three required section headers; falls back to
    /// [`deterministic_fallback`] if validation fails.
    pub async fn summarize_conversation(
        &self,
        history: &[LlmMessage],
        prior_summary: Option<&str>,
        fallback_stats: FallbackStats,
    ) -> FabricResult<String> {
        let mut system = String::from(
            "Summarize the conversation so far using exactly these three section \
             headers, each on its own line: TECHNICAL/SYSTEM INFORMATION:, \
             USER INTERACTION:, AGENT COORDINATION CONTEXT:. Do not use a \
             conversational introduction.",
        );
        if let Some(prior) = prior_summary {
            system.push_str(&format!("\n\nPrior summary:\n{prior}"));
        }

        let mut messages = vec![LlmMessage::system(system)];
        messages.extend_from_slice(history);

        let response = self.llm.invoke(&messages, InvokeOptions::deterministic()).await?;

        if is_valid_summary(&response) {
            Ok(response)
        } else {
            Ok(deterministic_fallback(&fallback_stats))
        }
    }
}

/// `true` if `summary` contains all three required section headers and
/// does not open with a conversational phrase.
fn is_valid_summary(summary: &str) -> bool {
    let has_all_sections = REQUIRED_SECTIONS.iter().all(|s| summary.contains(s));
    let opens_conversationally = summary
        .trim_start()
        .to_lowercase()
        .starts_with("sure,")
        || summary.trim_start().to_lowercase().starts_with("here's");
    has_all_sections && !opens_conversationally
}

/// Inputs for the deterministic fallback summary.
#[derive(Debug, Clone, Default)]
pub struct FallbackStats {
    /// Total messages in the thread.
    pub message_count: usize,
    /// `true` if any tool call occurred.
    pub has_tool_calls: bool,
    /// Names of agents that participated.
    pub agent_names: Vec<String>,
    /// Number of task errors observed.
    pub error_count: usize,
}

/// Build a deterministic summary derived purely from counters, used when
/// LLM output fails format validation.
pub fn deterministic_fallback(stats: &FallbackStats) -> String {
    format!(
        "TECHNICAL/SYSTEM INFORMATION:\n{} messages exchanged; {} tool call(s) observed.\n\n\
         USER INTERACTION:\n{} error(s) encountered during execution.\n\n\
         AGENT COORDINATION CONTEXT:\nAgents involved: {}.",
        stats.message_count,
        if stats.has_tool_calls { "one or more" } else { "no" },
        stats.error_count,
        if stats.agent_names.is_empty() {
            "none".to_string()
        } else {
            stats.agent_names.join(", ")
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_summary_has_all_three_sections() {
        let good = "TECHNICAL/SYSTEM INFORMATION:\nfoo\nUSER INTERACTION:\nbar\nAGENT COORDINATION CONTEXT:\nbaz";
        assert!(is_valid_summary(good));
    }

    #[test]
    fn missing_section_fails_validation() {
        let bad = "TECHNICAL/SYSTEM INFORMATION:\nfoo\nUSER INTERACTION:\nbar";
        assert!(!is_valid_summary(bad));
    }

    #[test]
    fn conversational_intro_fails_validation() {
        let bad = "Sure, here's a summary. TECHNICAL/SYSTEM INFORMATION:\nfoo\nUSER INTERACTION:\nbar\nAGENT COORDINATION CONTEXT:\nbaz";
        assert!(!is_valid_summary(bad));
    }

    #[test]
    fn fallback_is_deterministic_given_same_stats() {
        let stats = FallbackStats {
            message_count: 10,
            has_tool_calls: true,
            agent_names: vec!["salesforce".to_string()],
            error_count: 1,
        };
        assert_eq!(deterministic_fallback(&stats), deterministic_fallback(&stats));
    }

    #[test]
    fn trigger_fires_on_message_count_or_elapsed_time() {
        struct Dummy;
        #[async_trait::async_trait]
        impl crate::llm::LlmGateway for Dummy {
            async fn invoke(&self, _: &[LlmMessage], _: InvokeOptions) -> FabricResult<String> {
                Ok(String::new())
            }
        }
        let summarizer = Summarizer::new(&Dummy);
        assert!(summarizer.should_summarize(3, 0));
        assert!(summarizer.should_summarize(0, 180));
        assert!(!summarizer.should_summarize(2, 100));
    }
}
