//! Message processor (C9): trims a conversation history down to a token
//! budget while keeping every tool call paired with its tool response.
//! Grounded on `original_source/src/utils/helpers.py`'s
//! `smart_preserve_messages`, which trims with LangChain's `trim_messages`
//! (`strategy="last"`, `start_on="human"`, `end_on=("human", "tool")`,
//! `include_system=True`) and falls back to a plain suffix slice. This
//! module operates directly on the JSON message shape persisted in
//! [`crate::orchestrator::PlanExecuteState::messages`] rather than
//! [`crate::llm::LlmMessage`], since only the JSON shape carries
//! `tool_calls`/`tool_call_id`.

use serde_json::Value;

const CHARS_PER_TOKEN: f64 = 4.0;
const TOKEN_SAFETY_MULTIPLIER: f64 = 1.1;

/// Rough token estimate: ~4 characters per token plus a safety margin, used
/// in place of a real tokenizer.
fn estimate_tokens(text: &str) -> usize {
    ((text.chars().count() as f64 / CHARS_PER_TOKEN) * TOKEN_SAFETY_MULTIPLIER).ceil() as usize
}

fn message_tokens(message: &Value) -> usize {
    let content = message.get("content").and_then(|v| v.as_str()).unwrap_or_default();
    estimate_tokens(content)
}

fn role_of(message: &Value) -> &str {
    message.get("role").and_then(|v| v.as_str()).unwrap_or("")
}

/// Ids of tool calls an assistant message issued, if any.
fn tool_call_ids(message: &Value) -> Vec<&str> {
    message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| calls.iter().filter_map(|c| c.get("id").and_then(|i| i.as_str())).collect())
        .unwrap_or_default()
}

/// The tool-call id a `tool` role message is responding to, if any.
fn tool_response_of(message: &Value) -> Option<&str> {
    if role_of(message) != "tool" {
        return None;
    }
    message.get("tool_call_id").and_then(|v| v.as_str())
}

/// Walk `messages[start..]` for `tool` responses whose matching call lives
/// before `start`, and pull `start` back to include the call. Repeats until
/// stable, since pulling the window back can expose another orphaned pair.
fn enforce_tool_pairs(messages: &[Value], start: usize) -> usize {
    let mut start = start;
    loop {
        let mut widened = start;
        for message in &messages[start..] {
            let Some(call_id) = tool_response_of(message) else { continue };
            if let Some(caller_idx) = messages[..start]
                .iter()
                .enumerate()
                .rev()
                .find(|(_, m)| tool_call_ids(m).contains(&call_id))
                .map(|(idx, _)| idx)
            {
                widened = widened.min(caller_idx);
            }
        }
        if widened == start {
            return start;
        }
        start = widened;
    }
}

/// Trim `messages` to fit within `max_tokens`, keeping the most recent
/// messages first (the "last" strategy) and extending the kept window
/// backward as needed so no `tool` response is separated from the
/// assistant message that issued its call. System messages are always kept
/// when `keep_system` is set, regardless of the token walk.
pub fn trim_for_context(messages: &[Value], max_tokens: usize, keep_system: bool) -> Vec<Value> {
    if messages.is_empty() {
        return Vec::new();
    }

    let system: Vec<Value> = if keep_system {
        messages.iter().filter(|m| role_of(m) == "system").cloned().collect()
    } else {
        Vec::new()
    };
    let system_tokens: usize = system.iter().map(message_tokens).sum();
    let budget = max_tokens.saturating_sub(system_tokens);

    let mut start = messages.len();
    let mut used = 0usize;
    while start > 0 {
        let candidate = message_tokens(&messages[start - 1]);
        // Always keep at least one message even if it alone exceeds budget.
        if used + candidate > budget && start != messages.len() {
            break;
        }
        used += candidate;
        start -= 1;
    }
    let start = enforce_tool_pairs(messages, start);

    let mut out = system;
    out.extend(messages[start..].iter().cloned());
    out
}

/// Keep roughly the last `keep_count` messages, matching the original
/// helper's `max_tokens=keep_count*800` budget and `include_system=True`.
/// Falls back to a plain suffix slice when `messages` already fits.
pub fn smart_preserve(messages: &[Value], keep_count: usize) -> Vec<Value> {
    if messages.len() <= keep_count {
        return messages.to_vec();
    }
    let max_tokens = keep_count.saturating_mul(800).max(1);
    trim_for_context(messages, max_tokens, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human(content: &str) -> Value {
        serde_json::json!({"role": "user", "content": content})
    }

    fn assistant_with_call(content: &str, call_id: &str) -> Value {
        serde_json::json!({"role": "assistant", "content": content, "tool_calls": [{"id": call_id}]})
    }

    fn tool_response(call_id: &str, content: &str) -> Value {
        serde_json::json!({"role": "tool", "tool_call_id": call_id, "content": content})
    }

    #[test]
    fn smart_preserve_returns_everything_under_keep_count() {
        let messages = vec![human("hi"), human("there")];
        let kept = smart_preserve(&messages, 5);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn smart_preserve_extends_window_to_keep_tool_pair_intact() {
        let messages = vec![
            human("look up the account"),
            assistant_with_call("checking CRM", "call_1"),
            tool_response("call_1", "found Acme"),
            human("thanks"),
        ];
        // keep_count=1 would naively keep only the trailing human message,
        // splitting the tool response from its call.
        let kept = smart_preserve(&messages, 1);
        let tool_msg_kept = kept.iter().any(|m| role_of(m) == "tool");
        if tool_msg_kept {
            let call_kept = kept.iter().any(|m| role_of(m) == "assistant" && tool_call_ids(m).contains(&"call_1"));
            assert!(call_kept, "tool response kept without its matching call");
        }
    }

    #[test]
    fn trim_for_context_never_splits_a_pair() {
        let messages = vec![
            assistant_with_call("call out", "call_9"),
            tool_response("call_9", "result"),
            human("ok"),
        ];
        // A budget that would naively keep only the trailing human message.
        let kept = trim_for_context(&messages, 1, false);
        let has_response = kept.iter().any(|m| tool_response_of(m).is_some());
        let has_call = kept.iter().any(|m| tool_call_ids(m).contains(&"call_9"));
        assert_eq!(has_response, has_call);
    }

    #[test]
    fn trim_for_context_keeps_system_messages_outside_the_window() {
        let messages = vec![
            serde_json::json!({"role": "system", "content": "be concise"}),
            human("one"),
            human("two"),
            human("three"),
        ];
        let kept = trim_for_context(&messages, 1, true);
        assert!(kept.iter().any(|m| role_of(m) == "system"));
    }

    #[test]
    fn trim_for_context_on_empty_input_is_empty() {
        assert!(trim_for_context(&[], 100, true).is_empty());
    }
}
