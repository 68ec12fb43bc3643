//! Core type definitions for the CQRS transport.
//!
//! This crate defines the transport-agnostic types shared by the envelope
//! codec and the storage layer:
//! - Envelope identifiers
//! - The attribute model (typed key/value side-channel)
//! - Message envelopes, items and references
//! - The payload trait object and its runtime type marker
//! - The contract-name mapper and per-type serializer collaborator traits
//!
//! Concrete wire framing lives in `cqrs-transport`; nothing here knows how
//! bytes are laid out.

mod attributes;
mod contract;
mod envelope;
mod ids;
mod payload;

pub use attributes::{keys, AttributeValue, Attributes};
pub use contract::{ContractMapper, MessageSerializer};
pub use envelope::{EnvelopeBuilder, ItemContent, MessageEnvelope, MessageItem, MessageReference};
pub use ids::EnvelopeId;
pub use payload::{MappedType, Payload};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by payload serializers and type conversions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("type {0} is not registered with the serializer")]
    UnknownType(String),

    #[error("payload is not an instance of {expected}")]
    PayloadMismatch { expected: String },
}
