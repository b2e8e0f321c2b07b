//! Turns a completed tool block into a typed invocation.
//!
//! The block body is a flat sequence of `<param>value</param>` elements.
//! Values are plain text up to the matching closer, so a value may contain
//! angle brackets or markup without escaping. Coercion is driven entirely
//! by the parameter name and never fails: anything that does not parse as
//! the expected type stays a string.

use crate::tags;
use lorecall_core::{BlockKind, ContentBlock, ParamValue, ProtocolError, ToolInvocation};
use std::collections::BTreeMap;

/// Parameter names carrying integer values.
const INT_NAMES: [&str; 8] = [
    "top_k",
    "max_results",
    "limit",
    "count",
    "max_depth",
    "start_line",
    "end_line",
    "context_lines",
];
const INT_SUFFIXES: [&str; 5] = ["_count", "_k", "_size", "_limit", "_lines"];

const FLOAT_NAMES: [&str; 3] = ["min_score", "threshold", "temperature"];
const FLOAT_SUFFIXES: [&str; 2] = ["_score", "_threshold"];

const BOOL_NAMES: [&str; 3] = ["case_sensitive", "recursive", "include_content"];
const BOOL_PREFIXES: [&str; 2] = ["is_", "has_"];

const LIST_NAMES: [&str; 4] = ["paths", "extensions", "urls", "keywords"];

/// Extract the tool name and typed parameters from a completed tool block.
pub fn extract_invocation(block: &ContentBlock) -> Result<ToolInvocation, ProtocolError> {
    if block.kind != BlockKind::ToolCall {
        return Err(ProtocolError::MalformedBlock(format!(
            "{} block is not a tool call",
            block.kind
        )));
    }
    let tool_name = block
        .tool_name
        .clone()
        .ok_or_else(|| ProtocolError::MalformedBlock("tool block carries no tool name".into()))?;
    if !tags::is_known_tool(&tool_name) {
        return Err(ProtocolError::UnknownTool(tool_name));
    }
    if !block.complete {
        return Err(ProtocolError::TruncatedBlock { kind: tool_name });
    }
    let params = parse_params(&block.text)?;
    Ok(ToolInvocation {
        tool_name,
        params,
        raw_block: block.text.clone(),
    })
}

fn parse_params(body: &str) -> Result<BTreeMap<String, ParamValue>, ProtocolError> {
    let mut params = BTreeMap::new();
    let mut rest = body;
    loop {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return Ok(params);
        }
        let Some(after_open) = trimmed.strip_prefix('<') else {
            return Err(ProtocolError::MalformedBlock(format!(
                "stray text in tool body near {:?}",
                snippet(trimmed)
            )));
        };
        let Some(name_end) = after_open.find('>') else {
            return Err(ProtocolError::MalformedBlock(
                "unterminated parameter tag".into(),
            ));
        };
        let name = &after_open[..name_end];
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ProtocolError::MalformedBlock(format!(
                "invalid parameter name {name:?}"
            )));
        }
        let closer = format!("</{name}>");
        let value_and_rest = &after_open[name_end + 1..];
        let Some(value_end) = value_and_rest.find(&closer) else {
            return Err(ProtocolError::MalformedBlock(format!(
                "parameter <{name}> is never closed"
            )));
        };
        let raw = value_and_rest[..value_end].trim();
        params.insert(name.to_string(), coerce(name, raw));
        rest = &value_and_rest[value_end + closer.len()..];
    }
}

fn snippet(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

/// Coerce a raw parameter value by what its name promises. Total: every
/// failure falls back to [`ParamValue::Str`].
pub fn coerce(name: &str, raw: &str) -> ParamValue {
    if wants_int(name) {
        if let Ok(v) = raw.trim().parse::<i64>() {
            return ParamValue::Int(v);
        }
    } else if wants_float(name) {
        if let Ok(v) = raw.trim().parse::<f64>() {
            return ParamValue::Float(v);
        }
    } else if wants_bool(name) {
        if let Some(v) = parse_bool(raw) {
            return ParamValue::Bool(v);
        }
    } else if wants_list(name) {
        return ParamValue::StrList(parse_list(raw));
    }
    ParamValue::Str(raw.to_string())
}

fn wants_int(name: &str) -> bool {
    INT_NAMES.contains(&name) || INT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn wants_float(name: &str) -> bool {
    FLOAT_NAMES.contains(&name) || FLOAT_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn wants_bool(name: &str) -> bool {
    BOOL_NAMES.contains(&name) || BOOL_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn wants_list(name: &str) -> bool {
    LIST_NAMES.contains(&name) || name.ends_with("_list")
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// A list value is either a JSON array or a comma-separated line.
fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.starts_with('[') {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(trimmed) {
            return items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect();
        }
    }
    trimmed
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
