//! # lorecall Tools
//!
//! The retrieval tool vocabulary the model calls through tag elements:
//! semantic, lexical and regex search over the indexed knowledge base,
//! whole-file and line-range retrieval, and a web fetcher.
//!
//! [`ToolKind`] is the closed set of tools; [`StubDispatcher`] answers
//! every call with shaped mock payloads so the agent loop can run without
//! a live index behind it.

pub mod kind;
pub mod stub;

pub use kind::ToolKind;
pub use stub::StubDispatcher;
