//! Typed tool parameters, invocations, and outcomes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A coerced tool parameter value.
///
/// An explicit tagged union rather than raw strings or loose JSON: the
/// dispatcher can match on the variant it expects and fall back gracefully
/// when the model sent something else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StrList(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float accessor; integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(items) => Some(items),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::StrList(items) => write!(f, "{}", items.join(", ")),
        }
    }
}

/// A fully extracted tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Wire name of the tool (e.g. `semantic_search`).
    pub tool_name: String,

    /// Coerced parameters. A `BTreeMap` keeps iteration deterministic.
    pub params: BTreeMap<String, ParamValue>,

    /// The raw block body as classified, kept for diagnostics.
    pub raw_block: String,
}

impl ToolInvocation {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

/// The result of dispatching one tool invocation.
///
/// A value, not an error: failed executions carry their message here so the
/// orchestrator can always render a result turn for the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,

    pub success: bool,

    /// Tool output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Failure description on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Wall-clock execution time.
    pub latency_ms: u64,
}

impl ToolOutcome {
    /// Successful outcome.
    pub fn ok(tool_name: impl Into<String>, data: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            data: Some(data.into()),
            error_message: None,
            latency_ms,
        }
    }

    /// Failed outcome.
    pub fn failed(
        tool_name: impl Into<String>,
        message: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            data: None,
            error_message: Some(message.into()),
            latency_ms,
        }
    }
}
