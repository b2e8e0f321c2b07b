//! # lorecall Protocol
//!
//! The tag protocol spoken between the model and the engine: a token stream
//! annotated with `<thinking>`, `<present_answer>`, `<tool_*>` and metadata
//! elements. This crate turns that stream into typed content blocks and
//! typed tool invocations.
//!
//! The pipeline per model response:
//!
//! 1. [`NewlineSquasher`] collapses newline runs so tag matching sees a
//!    canonical stream.
//! 2. [`BlockClassifier`] classifies fragments into blocks, emitting
//!    [`StreamDelta`](lorecall_core::StreamDelta)s and never leaking
//!    partial or hidden markup.
//! 3. [`extract_invocation`] parses completed tool blocks into
//!    [`ToolInvocation`](lorecall_core::ToolInvocation)s.
//!
//! All three are plain synchronous state machines; the async world lives in
//! the transport and agent crates.

pub mod classifier;
pub mod extract;
pub mod preprocess;
pub mod tags;

pub use classifier::BlockClassifier;
pub use extract::{coerce, extract_invocation};
pub use preprocess::NewlineSquasher;
pub use tags::{is_known_tool, TagMatch, TagSpec, TagTable, METADATA_NAMES, TOOL_NAMES};
