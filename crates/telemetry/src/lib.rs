//! # lorecall Telemetry
//!
//! Run reports for the agent loop: one [`IterationRecord`] per model round
//! trip with its tool outcomes and latencies, aggregated into a
//! [`RunReport`] the caller gets back alongside the answer. Structured
//! logging stays in `tracing`; this crate is the durable, serializable
//! record.

pub mod report;

pub use report::{IterationRecord, RunReport};
