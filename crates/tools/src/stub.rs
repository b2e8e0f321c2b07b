//! Stub dispatcher with canned retrieval results.
//!
//! In production each tool would hit the real index (vector store, tantivy,
//! ripgrep, a fetcher). The stub returns shaped mock payloads so the whole
//! loop, classification through tool results and back into the next prompt,
//! can be exercised end-to-end without infrastructure.

use crate::kind::ToolKind;
use async_trait::async_trait;
use lorecall_core::{ToolDispatcher, ToolInvocation, ToolOutcome};
use std::time::Instant;
use tracing::debug;

pub struct StubDispatcher;

#[async_trait]
impl ToolDispatcher for StubDispatcher {
    async fn dispatch(&self, invocation: &ToolInvocation) -> ToolOutcome {
        let started = Instant::now();
        let elapsed = |s: Instant| s.elapsed().as_millis() as u64;

        let Some(kind) = ToolKind::from_name(&invocation.tool_name) else {
            return ToolOutcome::failed(
                &invocation.tool_name,
                format!("unknown tool: {}", invocation.tool_name),
                elapsed(started),
            );
        };

        debug!(tool = %kind, params = invocation.params.len(), "Dispatching stub tool");

        let payload = match kind {
            ToolKind::SemanticSearch => semantic_search(invocation),
            ToolKind::LexicalSearch => lexical_search(invocation),
            ToolKind::RegexSearch => regex_search(invocation),
            ToolKind::GetFileContent => get_file_content(invocation),
            ToolKind::GetFileSection => get_file_section(invocation),
            ToolKind::WebCrawler => web_crawler(invocation),
        };

        match payload {
            Ok(value) => ToolOutcome::ok(
                kind.name(),
                serde_json::to_string_pretty(&value).unwrap_or_default(),
                elapsed(started),
            ),
            Err(message) => ToolOutcome::failed(kind.name(), message, elapsed(started)),
        }
    }
}

fn str_param<'a>(invocation: &'a ToolInvocation, name: &str) -> Option<&'a str> {
    invocation.get(name).and_then(|v| v.as_str())
}

fn int_param(invocation: &ToolInvocation, name: &str, default: i64) -> i64 {
    invocation.get(name).and_then(|v| v.as_int()).unwrap_or(default)
}

fn require_str<'a>(invocation: &'a ToolInvocation, name: &str) -> Result<&'a str, String> {
    str_param(invocation, name).ok_or_else(|| format!("missing '{name}' parameter"))
}

fn semantic_search(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let query = require_str(invocation, "query")?;
    let top_k = int_param(invocation, "top_k", 5).clamp(1, 10) as usize;
    let min_score = invocation
        .get("min_score")
        .and_then(|v| v.as_float())
        .unwrap_or(0.0);

    let chunks: Vec<serde_json::Value> = (0..top_k)
        .map(|i| {
            let score = 0.95 - (i as f64 * 0.07);
            serde_json::json!({
                "path": format!("docs/indexed_{:02}.md", i + 1),
                "chunk_index": i,
                "score": score,
                "content": format!(
                    "Chunk {} about '{}'. Mock content standing in for an embedded passage.",
                    i + 1, query
                ),
            })
        })
        .filter(|c| c["score"].as_f64().unwrap_or(0.0) >= min_score)
        .collect();

    Ok(serde_json::json!({ "query": query, "results": chunks }))
}

fn lexical_search(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let query = require_str(invocation, "query")?;
    let max_results = int_param(invocation, "max_results", 10).clamp(1, 50) as usize;

    let hits: Vec<serde_json::Value> = (0..max_results.min(4))
        .map(|i| {
            serde_json::json!({
                "path": format!("src/module_{}.rs", i + 1),
                "line": 10 + i * 7,
                "snippet": format!("// mention of {query} at hit {}", i + 1),
            })
        })
        .collect();

    Ok(serde_json::json!({ "query": query, "hits": hits }))
}

fn regex_search(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let pattern = require_str(invocation, "pattern")?;
    let case_sensitive = invocation
        .get("case_sensitive")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    Ok(serde_json::json!({
        "pattern": pattern,
        "case_sensitive": case_sensitive,
        "matches": [
            { "path": "src/lib.rs", "line": 14, "text": format!("matched `{pattern}`") },
            { "path": "src/parser.rs", "line": 88, "text": format!("matched `{pattern}` again") },
        ],
    }))
}

fn get_file_content(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let path = require_str(invocation, "path")?;
    let content: String = (1..=12)
        .map(|n| format!("line {n} of {path}\n"))
        .collect();

    Ok(serde_json::json!({
        "path": path,
        "line_count": 12,
        "truncated": false,
        "content": content,
    }))
}

/// Widest section the stub will render, like the `top_k` and
/// `max_results` clamps on the search tools.
const SECTION_MAX_LINES: i64 = 200;

fn get_file_section(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let path = require_str(invocation, "path")?;
    let start_line = int_param(invocation, "start_line", 1).max(1);
    let end_line = int_param(invocation, "end_line", start_line.saturating_add(19));
    if end_line < start_line {
        return Err(format!(
            "end_line {end_line} is before start_line {start_line}"
        ));
    }
    // Model-supplied bounds; cap the span before rendering it.
    let end_line = end_line.min(start_line.saturating_add(SECTION_MAX_LINES - 1));

    let content: String = (start_line..=end_line)
        .map(|n| format!("line {n} of {path}\n"))
        .collect();

    Ok(serde_json::json!({
        "path": path,
        "start_line": start_line,
        "end_line": end_line,
        "content": content,
    }))
}

fn web_crawler(invocation: &ToolInvocation) -> Result<serde_json::Value, String> {
    let url = require_str(invocation, "url")?;

    Ok(serde_json::json!({
        "url": url,
        "title": "Mock page",
        "fetched_at": chrono::Utc::now().to_rfc3339(),
        "text": format!("Extracted text of {url}. Mock body for pipeline tests."),
    }))
}
