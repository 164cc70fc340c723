//! Structured-memory extractor (C16): pulls account/contact/opportunity/
//! case/task/lead records out of tool-agent responses and merges them by id
//! into the thread's [`StructuredMemory`]. Grounded on
//! `original_source/src/orchestrator/background_tasks.py`'s
//! `memorize_records` — the merge-by-id loop over the six collections, kept
//! verbatim in spirit; the trustcall extraction call becomes a single
//! deterministic LLM invocation per candidate message. New items win on
//! conflict: merging an incoming record overwrites an existing one with the
//! same id.

use crate::error::FabricResult;
use crate::llm::{InvokeOptions, LlmGateway, LlmMessage};
use crate::orchestrator::plan::StructuredMemory;

const EXTRACTION_INSTRUCTION: &str = "Extract any account, contact, opportunity, case, task, or \
lead records mentioned in the message below. Respond with a single JSON object with keys \
\"accounts\", \"contacts\", \"opportunities\", \"cases\", \"tasks\", \"leads\", each mapping \
record id to the record object. Omit keys with no records. Respond with JSON only.";

/// A single agent/tool response considered for extraction.
pub struct Candidate<'a> {
    /// Name of the agent or tool that produced the message.
    pub source: &'a str,
    /// Message content to extract records from.
    pub content: &'a str,
}

/// `true` if `source` looks like a tool/agent message worth scanning,
/// mirroring the `'salesforce' in name.lower() or 'agent' in name.lower()`
/// filter.
fn is_extractable_source(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.contains("salesforce") || lower.contains("agent")
}

/// Extracts structured records from `candidates` and merges them into
/// `memory` by id, skipping records whose id is already present in the
/// target collection. A failed extraction for one candidate does not abort
/// the others.
pub async fn memorize_records(
    llm: &dyn LlmGateway,
    memory: &mut StructuredMemory,
    candidates: &[Candidate<'_>],
) -> FabricResult<usize> {
    let mut extracted = 0usize;

    for candidate in candidates.iter().filter(|c| is_extractable_source(c.source)) {
        let truncated: String = candidate.content.chars().take(2000).collect();
        let messages = vec![
            LlmMessage::system(EXTRACTION_INSTRUCTION),
            LlmMessage::user(truncated),
        ];

        let response = match llm.invoke(&messages, InvokeOptions::deterministic()).await {
            Ok(r) => r,
            Err(_) => continue,
        };

        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&response) else {
            continue;
        };

        extracted += merge_extraction(memory, &parsed);
    }

    Ok(extracted)
}

/// Merge `parsed`'s fields into `memory`. New items win on conflict: a
/// record whose id already exists in the target collection has its fields
/// replaced by the incoming record. Returns the count of genuinely new ids
/// (overwrites of an existing id are not counted).
fn merge_extraction(memory: &mut StructuredMemory, parsed: &serde_json::Value) -> usize {
    let mut added = 0usize;
    let fields: [(&str, &mut std::collections::HashMap<String, serde_json::Value>); 6] = [
        ("accounts", &mut memory.accounts),
        ("contacts", &mut memory.contacts),
        ("opportunities", &mut memory.opportunities),
        ("cases", &mut memory.cases),
        ("tasks", &mut memory.tasks),
        ("leads", &mut memory.leads),
    ];

    for (field, target) in fields {
        let Some(records) = parsed.get(field).and_then(|v| v.as_object()) else {
            continue;
        };
        for (id, record) in records {
            if target.insert(id.clone(), record.clone()).is_none() {
                added += 1;
            }
        }
    }

    added
}

/// Total record count across all six collections, used for log lines and
/// the `entities_extracted` counter.
pub fn entity_count(memory: &StructuredMemory) -> usize {
    memory.accounts.len()
        + memory.contacts.len()
        + memory.opportunities.len()
        + memory.cases.len()
        + memory.tasks.len()
        + memory.leads.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticGateway(String);

    #[async_trait]
    impl LlmGateway for StaticGateway {
        async fn invoke(&self, _messages: &[LlmMessage], _options: InvokeOptions) -> FabricResult<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn non_agent_source_is_skipped() {
        assert!(!is_extractable_source("planner"));
        assert!(is_extractable_source("salesforce_agent"));
        assert!(is_extractable_source("crm_agent_executor"));
    }

    #[test]
    fn merge_overwrites_existing_ids_new_items_win() {
        let mut memory = StructuredMemory::default();
        memory.accounts.insert("acc_1".to_string(), serde_json::json!({"name": "Acme"}));

        let parsed = serde_json::json!({
            "accounts": {
                "acc_1": {"name": "Acme Overwritten"},
                "acc_2": {"name": "Globex"}
            }
        });
        let added = merge_extraction(&mut memory, &parsed);

        assert_eq!(added, 1);
        assert_eq!(memory.accounts.len(), 2);
        assert_eq!(memory.accounts["acc_1"]["name"], "Acme Overwritten");
    }

    #[tokio::test]
    async fn memorize_records_merges_from_extractable_candidates_only() {
        let gateway = StaticGateway(
            serde_json::json!({"contacts": {"con_1": {"name": "Jane"}}}).to_string(),
        );
        let mut memory = StructuredMemory::default();
        let candidates = vec![
            Candidate { source: "planner", content: "contacts: {\"con_9\": {}}" },
            Candidate { source: "salesforce_agent", content: "found contact Jane" },
        ];

        let added = memorize_records(&gateway, &mut memory, &candidates).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(entity_count(&memory), 1);
        assert!(memory.contacts.contains_key("con_1"));
    }

    #[tokio::test]
    async fn invalid_json_response_is_skipped_without_error() {
        let gateway = StaticGateway("not json".to_string());
        let mut memory = StructuredMemory::default();
        let candidates = vec![Candidate { source: "agent_x", content: "whatever" }];

        let added = memorize_records(&gateway, &mut memory, &candidates).await.unwrap();

        assert_eq!(added, 0);
        assert_eq!(entity_count(&memory), 0);
    }
}
