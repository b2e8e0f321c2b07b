//! # lorecall Transport
//!
//! Streaming LLM backends behind the
//! [`ModelTransport`](lorecall_core::ModelTransport) trait:
//!
//! - [`SseTransport`]: OpenAI-compatible `/chat/completions` over SSE
//! - [`ScriptedTransport`]: canned replies for tests and demos
//!
//! Transports deal in raw text only. Tag-protocol parsing happens one layer
//! up, which keeps every backend interchangeable.

pub mod scripted;
pub mod sse;

pub use scripted::ScriptedTransport;
pub use sse::SseTransport;
