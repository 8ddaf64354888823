//! Interpretation of `/queue` and `/history/{id}` responses.

use crate::api::FileRef;

/// Output kinds searched for an artifact, in priority order.
pub const ARTIFACT_KINDS: &[&str] = &["images", "gifs", "videos"];

/// What the history endpoint says about a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryOutcome {
    /// Not finished yet (or unknown status).
    Pending,
    /// Finished successfully; `None` means no artifact on the output node.
    Succeeded(Option<FileRef>),
    /// Finished with errors, aggregated into one message.
    Failed(String),
}

/// Whether `prompt_id` is currently executing according to `GET /queue`.
///
/// Queue entries are arrays whose second element is the prompt id.
pub fn is_running(queue: &serde_json::Value, prompt_id: &str) -> bool {
    queue
        .get("queue_running")
        .and_then(|v| v.as_array())
        .is_some_and(|entries| {
            entries
                .iter()
                .any(|entry| entry.get(1).and_then(|v| v.as_str()) == Some(prompt_id))
        })
}

/// Interpret a `GET /history/{prompt_id}` body.
pub fn parse_history(
    history: &serde_json::Value,
    prompt_id: &str,
    output_node: &str,
) -> HistoryOutcome {
    let Some(entry) = history.get(prompt_id) else {
        return HistoryOutcome::Pending;
    };
    let status = entry.get("status");
    let status_str = status
        .and_then(|s| s.get("status_str"))
        .and_then(|s| s.as_str());

    match status_str {
        Some("error") => {
            let messages = status.map(collect_execution_errors).unwrap_or_default();
            if messages.is_empty() {
                HistoryOutcome::Failed("Generation failed without an error message".to_string())
            } else {
                HistoryOutcome::Failed(messages.join("; "))
            }
        }
        Some("success") => HistoryOutcome::Succeeded(find_artifact(entry, output_node)),
        _ => HistoryOutcome::Pending,
    }
}

/// Messages are `[event_name, data]` pairs; keep every `execution_error`.
fn collect_execution_errors(status: &serde_json::Value) -> Vec<String> {
    let Some(messages) = status.get("messages").and_then(|m| m.as_array()) else {
        return Vec::new();
    };
    messages
        .iter()
        .filter(|m| m.get(0).and_then(|v| v.as_str()) == Some("execution_error"))
        .filter_map(|m| m.get(1))
        .map(|data| {
            let message = data
                .get("exception_message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .trim();
            match data.get("node_type").and_then(|v| v.as_str()) {
                Some(node_type) => format!("{node_type}: {message}"),
                None => message.to_string(),
            }
        })
        .collect()
}

fn find_artifact(entry: &serde_json::Value, output_node: &str) -> Option<FileRef> {
    let node_output = entry.get("outputs")?.get(output_node)?;
    ARTIFACT_KINDS.iter().find_map(|kind| {
        node_output
            .get(*kind)
            .and_then(|list| list.as_array())
            .and_then(|list| list.first())
            .and_then(|file| serde_json::from_value::<FileRef>(file.clone()).ok())
    })
}
