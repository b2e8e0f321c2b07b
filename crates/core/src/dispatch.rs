//! The tool dispatch abstraction.

use crate::value::{ToolInvocation, ToolOutcome};
use async_trait::async_trait;

/// Executes extracted tool invocations.
///
/// Dispatch is total: failures are encoded in the returned outcome, never
/// raised, so the orchestrator can always render a result turn for the
/// model regardless of what the tool did.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Execute one invocation and report what happened.
    async fn dispatch(&self, invocation: &ToolInvocation) -> ToolOutcome;
}
