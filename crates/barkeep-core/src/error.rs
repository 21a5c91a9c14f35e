//! Error types for Barkeep conversation orchestration.
//!
//! The remote recommendation service is the only fallible collaborator,
//! so a single transport taxonomy covers every failure the orchestrator
//! can observe. Failures are logged at the call site and park the state
//! machine; there is no retry anywhere in the core.

/// A specialized `Result` type for Barkeep session operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Network, HTTP, or decoding failure on a remote service call.
///
/// The orchestrator does not distinguish further than this taxonomy:
/// every variant is handled identically (log, halt forward progress on
/// that exchange, wait for a user-triggered reset).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced an HTTP response (DNS, connect,
    /// timeout, connection reset).
    #[error("Request to '{endpoint}' failed: {message}\n\nSuggestion: Check that the recommendation service is running and reachable")]
    Request {
        /// Logical endpoint name (e.g. "start", "question").
        endpoint: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// The service answered with a non-success HTTP status.
    #[error("Service returned HTTP {status} for '{endpoint}'\n\nSuggestion: Verify the access token and the session id are still valid")]
    Status {
        /// Logical endpoint name.
        endpoint: String,
        /// The HTTP status code received.
        status: u16,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("Could not decode '{endpoint}' response: {message}")]
    Decode {
        /// Logical endpoint name.
        endpoint: String,
        /// Description of the decode failure.
        message: String,
    },
}

impl TransportError {
    /// Creates a new `Request` error.
    #[must_use]
    pub fn request(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Returns the logical endpoint the failure occurred on.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Request { endpoint, .. }
            | Self::Status { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }
}
