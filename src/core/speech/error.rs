//! Error types for the streaming speech session engine.
//!
//! Remote failures surfaced by the model stream are classified into a fixed
//! taxonomy. A subset of that taxonomy is retryable at the whole-session
//! level; the rest is fatal for the current session.

use thiserror::Error;

/// Message the remote side uses when it gives up waiting for the next
/// expected input event. Matched verbatim inside validation errors.
pub const INPUT_TIMEOUT_MESSAGE: &str = "Timed out waiting for input events";

/// Errors that can occur during a streaming speech session.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Request or event rejected by remote validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacks permission for the model or operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Model or resource does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Request rate exceeded
    #[error("Throttled: {0}")]
    Throttling(String),

    /// Error raised inside the model's own output stream
    #[error("Model stream error: {0}")]
    ModelStream(String),

    /// Remote internal server failure
    #[error("Internal server error: {0}")]
    InternalServer(String),

    /// Service temporarily unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Model took too long to produce a response
    #[error("Model timed out: {0}")]
    ModelTimeout(String),

    /// Model is still warming up and cannot serve yet
    #[error("Model not ready: {0}")]
    ModelNotReady(String),

    /// Outbound queue used after close
    #[error("Outbound queue is closed")]
    QueueClosed,

    /// Inbound frame with no recognized single top-level event tag
    #[error("Invalid event structure: {0}")]
    MalformedFrame(String),

    /// Invalid caller-supplied configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential resolution failed before the stream was opened
    #[error("Credential resolution failed: {0}")]
    Credentials(String),

    /// Failure in the duplex transport itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// Event could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Session identifier already has an active session
    #[error("Session already active: {0}")]
    SessionActive(String),

    /// No session registered under the given identifier
    #[error("Unknown session: {0}")]
    UnknownSession(String),
}

/// Result type for speech session operations.
pub type SpeechResult<T> = Result<T, SpeechError>;

impl SpeechError {
    /// Whether a caller may retry the whole session after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpeechError::Throttling(_)
                | SpeechError::ServiceUnavailable(_)
                | SpeechError::InternalServer(_)
                | SpeechError::ModelNotReady(_)
        )
    }

    /// Whether this is the remote "gave up waiting for input" condition.
    ///
    /// The remote reports it as a validation error; the engine treats it as a
    /// soft turn boundary rather than a failure.
    pub fn is_input_timeout(&self) -> bool {
        matches!(self, SpeechError::Validation(msg) if msg.contains(INPUT_TIMEOUT_MESSAGE))
    }

    /// Whether the outbound queue must be left open after this error.
    ///
    /// Model-stream exceptions can occur transiently mid-turn without ending
    /// the session, so the queue stays open for that one variant only.
    pub fn keeps_queue_open(&self) -> bool {
        matches!(self, SpeechError::ModelStream(_))
    }
}
