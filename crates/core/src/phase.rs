//! Run lifecycle phases.

use serde::{Deserialize, Serialize};

/// Where a run currently is in its lifecycle.
///
/// A run moves `Pending -> Processing -> LlmRoundTrip`, then bounces between
/// `LlmRoundTrip` and `ToolsExecuting` until it reaches `Completed`. Any
/// phase may drop to `Error`. Budget exhaustion exits through `Completed`,
/// not `Error`; the outcome carries a degraded marker instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Pending,
    Processing,
    LlmRoundTrip,
    ToolsExecuting,
    Completed,
    Error,
}

impl AgentPhase {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: AgentPhase) -> bool {
        use AgentPhase::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, LlmRoundTrip)
                | (LlmRoundTrip, ToolsExecuting)
                | (ToolsExecuting, LlmRoundTrip)
                | (LlmRoundTrip, Completed)
                | (ToolsExecuting, Completed)
                | (_, Error)
        )
    }

    /// Whether the run is finished (no further transitions except `Error`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::LlmRoundTrip => write!(f, "llm_round_trip"),
            Self::ToolsExecuting => write!(f, "tools_executing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}
