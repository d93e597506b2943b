//! Core error types for dbviz-core.
//!
//! Only malformed *requests* are errors. A well-formed request whose
//! semantics fail (deleting a missing key, reading with an unknown
//! transaction, parsing broken SQL) is reported inside the trace as a step.

use thiserror::Error;

/// Errors produced while decoding identifiers and other core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A prefixed identifier string (`node-3`, `tx-1`, ...) did not parse.
    #[error("invalid {kind} id: '{value}'")]
    InvalidId { kind: &'static str, value: String },
}

/// Errors raised before a producer runs, when the request itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The operation kind is unknown or its parameters failed to decode.
    #[error("invalid '{operation}' request: {reason}")]
    InvalidPayload { operation: String, reason: String },

    /// The project configuration object failed to decode.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
