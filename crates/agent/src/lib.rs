//! # lorecall Agent
//!
//! The orchestrator: a bounded multi-turn loop over the tag protocol.
//!
//! One run serves one user message:
//!
//! 1. Push the user turn and render the session as wire messages.
//! 2. Stream a model response through the classifier, forwarding deltas to
//!    the caller as they are produced.
//! 3. A completed `<present_answer>` block ends the run. Otherwise extract
//!    tool invocations, dispatch them, push a tool-results turn, and loop.
//! 4. The loop is bounded by `max_iterations`; exhausting the budget is a
//!    degraded completion carrying the best-effort answer, not an error.
//!
//! The transport and the dispatcher arrive as trait objects; this crate
//! never touches a network or a tool directly.

pub mod cancel;
pub mod orchestrator;
pub mod prompt;

pub use cancel::CancellationToken;
pub use orchestrator::{Orchestrator, RunOutcome};
