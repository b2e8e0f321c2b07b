//! # lorecall Core
//!
//! Domain types, traits, and error definitions for the lorecall streaming
//! agent engine. This crate defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod block;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod phase;
pub mod session;
pub mod transport;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use block::{BlockKind, ContentBlock, StreamDelta, StreamState};
pub use dispatch::ToolDispatcher;
pub use error::{AgentError, Error, ProtocolError, Result, SessionError, TransportError};
pub use event::{EngineEvent, EventBus};
pub use phase::AgentPhase;
pub use session::{ConversationTurn, Role, Session, SessionId, SessionStore};
pub use transport::{
    ModelTransport, StreamFragment, TransportMessage, TransportRequest, Usage,
};
pub use value::{ParamValue, ToolInvocation, ToolOutcome};
