//! Error types for the transport codec.

use thiserror::Error;

/// Result type for codec operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while framing or unframing envelopes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Header carries a format tag other than the supported schema.
    #[error("unsupported message format: expected {expected:#x}, found {found:#x}")]
    UnsupportedFormat { found: u32, expected: u32 },

    /// Buffer is shorter than its header or contract claims.
    #[error("truncated message: need {need} bytes, have {have}")]
    Truncated { need: u64, have: u64 },

    /// Declared lengths do not account for every byte of the buffer.
    #[error("length mismatch: declared {declared} bytes, found {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    /// Message exceeds the configured size limit.
    #[error("message too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    /// No contract name is mapped for a payload type.
    #[error("failed to find contract name for {0}")]
    ContractNameMissing(String),

    /// Envelope attribute holds a value kind the wire format cannot carry.
    #[error("attribute '{key}' holds unsupported {kind} value")]
    UnsupportedAttributeValue { key: String, kind: &'static str },

    /// Item attribute kind without a wire representation.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Attribute record carries an unknown discriminant.
    #[error("corrupt attribute: unknown discriminant {0}")]
    CorruptAttribute(u8),

    /// Attribute record is missing the field its discriminant requires.
    #[error("corrupt attribute: {0}")]
    MalformedAttribute(String),

    /// Timestamp attribute could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Reference buffer or fields are malformed.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Contract region encode/decode failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Per-type payload serializer failed.
    #[error("payload error: {0}")]
    Payload(#[from] cqrs_types::Error),
}
