//! # lorecall Session
//!
//! Backends for the [`SessionStore`](lorecall_core::SessionStore) trait.
//! Currently in-memory only; the trait seam is where a sqlite or redis
//! backend would plug in.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;
