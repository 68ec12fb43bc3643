//! Envelope transport codec for the CQRS framework.
//!
//! Two framings share the same opaque-bytes transport:
//!
//! - **Data messages**: a fixed header, a JSON envelope-contract region,
//!   then each item's serialized content in item order.
//! - **Reference messages**: UTF-16LE text starting with a signature,
//!   pointing at an envelope stored elsewhere.
//!
//! Receivers must check for the reference signature before parsing a data
//! header; [`read_frame`] does both in the right order.
//!
//! # Example
//!
//! ```
//! use cqrs_transport::{EnvelopeCodec, EnvelopeSerializer, Frame, JsonMessageSerializer};
//! use cqrs_types::{keys, MessageEnvelope};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Ping {
//!     seq: u32,
//! }
//!
//! let codec = EnvelopeCodec::new(JsonMessageSerializer::new().with::<Ping>("Ping"));
//! let envelope = MessageEnvelope::builder("E1")
//!     .add_content(Ping { seq: 1 })
//!     .add_attribute(keys::SENDER, "svc-a")
//!     .build();
//!
//! let bytes = codec.save_data_message(&envelope).unwrap();
//! match codec.read_frame(&bytes).unwrap() {
//!     Frame::Data(decoded) => assert_eq!(decoded.items()[0].payload::<Ping>(), Some(&Ping { seq: 1 })),
//!     Frame::Reference(_) => unreachable!(),
//! }
//! ```

mod codec;
pub mod contract;
mod error;
pub mod header;
pub mod profiler;
pub mod reference;
mod registry;

pub use codec::{decode_envelope, encode_envelope, CodecConfig, EnvelopeCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{TransportError, TransportResult};
pub use header::{MessageHeader, SCHEMA2_DATA_FORMAT};
pub use profiler::{EngineProfiler, NullProfiler, ProfileGuard, TracingProfiler};
pub use reference::{encode_reference, is_reference, try_decode_reference, REFERENCE_SIGNATURE};
pub use registry::JsonMessageSerializer;

use cqrs_types::{MessageEnvelope, MessageReference, MessageSerializer};

/// A decoded transport buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Reference(MessageReference),
    Data(MessageEnvelope),
}

/// Decodes a buffer of either framing, probing for a reference first.
pub fn read_frame(buffer: &[u8], serializer: &dyn MessageSerializer) -> TransportResult<Frame> {
    match try_decode_reference(buffer)? {
        Some(reference) => Ok(Frame::Reference(reference)),
        None => decode_envelope(buffer, serializer).map(Frame::Data),
    }
}

/// Saves and reads both message framings.
pub trait EnvelopeSerializer {
    fn save_reference_message(&self, reference: &MessageReference) -> TransportResult<Vec<u8>>;

    fn save_data_message(&self, envelope: &MessageEnvelope) -> TransportResult<Vec<u8>>;

    /// Returns `Ok(None)` when the buffer is not a reference message.
    fn try_read_as_reference(&self, buffer: &[u8]) -> TransportResult<Option<MessageReference>>;

    fn read_data_message(&self, buffer: &[u8]) -> TransportResult<MessageEnvelope>;

    /// Decodes either framing, probing for a reference first.
    fn read_frame(&self, buffer: &[u8]) -> TransportResult<Frame> {
        match self.try_read_as_reference(buffer)? {
            Some(reference) => Ok(Frame::Reference(reference)),
            None => self.read_data_message(buffer).map(Frame::Data),
        }
    }
}

impl<S: MessageSerializer> EnvelopeSerializer for EnvelopeCodec<S> {
    fn save_reference_message(&self, reference: &MessageReference) -> TransportResult<Vec<u8>> {
        encode_reference(reference)
    }

    fn save_data_message(&self, envelope: &MessageEnvelope) -> TransportResult<Vec<u8>> {
        self.encode(envelope)
    }

    fn try_read_as_reference(&self, buffer: &[u8]) -> TransportResult<Option<MessageReference>> {
        try_decode_reference(buffer)
    }

    fn read_data_message(&self, buffer: &[u8]) -> TransportResult<MessageEnvelope> {
        self.decode(buffer)
    }
}
