//! Error types for the lorecall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.
//!
//! Non-fatal stream anomalies (a truncated hidden block, a coercion
//! fallback) are logged and absorbed; only failures the caller can act on
//! become `Err` values.

use thiserror::Error;

/// The top-level error type for all lorecall operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Authentication failures and non-429 API errors are deterministic;
    /// everything else is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout(_)
            | Self::StreamInterrupted(_)
            | Self::RateLimited { .. } => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Malformed tool block: {0}")]
    MalformedBlock(String),

    #[error("Stream ended inside an unclosed {kind} block")]
    TruncatedBlock { kind: String },
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Illegal phase transition: {from} -> {to}")]
    PhaseViolation { from: String, to: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_correctly() {
        let err = Error::Transport(TransportError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn protocol_error_displays_correctly() {
        let err = Error::Protocol(ProtocolError::UnknownTool("grep_search".into()));
        assert!(err.to_string().contains("grep_search"));
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Network("connection reset".into()).is_retryable());
        assert!(TransportError::Timeout(120).is_retryable());
        assert!(TransportError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(
            TransportError::ApiError {
                status_code: 503,
                message: "overloaded".into()
            }
            .is_retryable()
        );
        assert!(
            !TransportError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
        assert!(!TransportError::AuthenticationFailed("bad key".into()).is_retryable());
    }

    #[test]
    fn agent_error_wraps_transport() {
        let err: AgentError = TransportError::Timeout(30).into();
        assert!(err.to_string().contains("30"));
    }
}
