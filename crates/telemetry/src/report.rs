//! Data model for run reports: per-iteration records and their aggregates.

use chrono::{DateTime, Utc};
use lorecall_core::{SessionId, ToolOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Iteration ─────────────────────────────────────────────────────────────

/// What happened in one loop iteration: one model round trip plus the tool
/// dispatches it requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index.
    pub index: usize,
    /// Outcomes of the tools dispatched this iteration, in extraction order.
    pub tool_results: Vec<ToolOutcome>,
    /// Wall-clock time of the model round trip.
    pub llm_latency_ms: u64,
    /// Summed wall-clock time of tool dispatches.
    pub tools_latency_ms: u64,
    /// Prompt tokens, when the transport reported usage.
    pub prompt_tokens: Option<u32>,
    /// Completion tokens, when the transport reported usage.
    pub completion_tokens: Option<u32>,
}

impl IterationRecord {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            tool_results: Vec::new(),
            llm_latency_ms: 0,
            tools_latency_ms: 0,
            prompt_tokens: None,
            completion_tokens: None,
        }
    }

    /// Record the outcome of one tool dispatch.
    pub fn record_tool(&mut self, outcome: ToolOutcome) {
        self.tools_latency_ms += outcome.latency_ms;
        self.tool_results.push(outcome);
    }

    pub fn record_usage(&mut self, prompt_tokens: u32, completion_tokens: u32) {
        self.prompt_tokens = Some(prompt_tokens);
        self.completion_tokens = Some(completion_tokens);
    }

    /// Total tokens this iteration, or 0 if usage was not reported.
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.unwrap_or(0) + self.completion_tokens.unwrap_or(0)
    }
}

// ── Run report ────────────────────────────────────────────────────────────

/// The telemetry record of one orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique report id.
    pub id: String,
    /// Session the run belongs to.
    pub session_id: SessionId,
    /// One record per completed iteration.
    pub iterations: Vec<IterationRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended (None while in flight).
    pub ended_at: Option<DateTime<Utc>>,
    /// True when the run hit the iteration budget and closed best-effort.
    pub degraded: bool,
}

impl RunReport {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            iterations: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            degraded: false,
        }
    }

    pub fn add_iteration(&mut self, record: IterationRecord) {
        self.iterations.push(record);
    }

    /// Mark the run as finished.
    pub fn end(&mut self, degraded: bool) {
        self.ended_at = Some(Utc::now());
        self.degraded = degraded;
    }

    /// Total model latency across iterations.
    pub fn total_llm_ms(&self) -> u64 {
        self.iterations.iter().map(|i| i.llm_latency_ms).sum()
    }

    /// Total tool latency across iterations.
    pub fn total_tools_ms(&self) -> u64 {
        self.iterations.iter().map(|i| i.tools_latency_ms).sum()
    }

    /// Number of tool dispatches across iterations.
    pub fn tool_call_count(&self) -> usize {
        self.iterations.iter().map(|i| i.tool_results.len()).sum()
    }

    /// Total tokens across iterations.
    pub fn total_tokens(&self) -> u32 {
        self.iterations.iter().map(|i| i.total_tokens()).sum()
    }
}
