//! Binary codec for message envelopes.
//!
//! A data message is laid out as
//!
//! ```text
//! [ header (20 bytes) ][ envelope contract (attributes_length) ][ item 0 ][ item 1 ] ...
//! ```
//!
//! Item contents are concatenated in item order; each item's contract
//! record holds the exact byte size of its block. Items whose contract
//! name the receiving serializer does not know are kept as raw bytes.

use crate::contract::{
    envelope_attributes_from_contract, envelope_attributes_to_contract, item_attributes_from_contract,
    item_attributes_to_contract, EnvelopeContract, ItemContract,
};
use crate::error::{TransportError, TransportResult};
use crate::header::MessageHeader;
use crate::profiler::{EngineProfiler, NullProfiler, ProfileGuard};
use cqrs_types::{EnvelopeId, ItemContent, MessageEnvelope, MessageItem, MessageSerializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Codec limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest encoded message accepted on encode or decode, in bytes.
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

fn to_usize(value: u64, have: usize) -> TransportResult<usize> {
    usize::try_from(value).map_err(|_| TransportError::Truncated {
        need: value,
        have: have as u64,
    })
}

/// Encodes an envelope into a data message.
pub fn encode_envelope(
    envelope: &MessageEnvelope,
    serializer: &dyn MessageSerializer,
) -> TransportResult<Vec<u8>> {
    encode_with(envelope, serializer, &NullProfiler)
}

/// Decodes a data message.
pub fn decode_envelope(buffer: &[u8], serializer: &dyn MessageSerializer) -> TransportResult<MessageEnvelope> {
    decode_with(buffer, serializer, &NullProfiler)
}

fn encode_with(
    envelope: &MessageEnvelope,
    serializer: &dyn MessageSerializer,
    profiler: &dyn EngineProfiler,
) -> TransportResult<Vec<u8>> {
    let mut content = Vec::new();
    let mut items = Vec::with_capacity(envelope.items().len());

    for item in envelope.items() {
        let start = content.len();
        let contract_name = match item.content() {
            ItemContent::Typed(payload) => {
                let ty = (**payload).mapped_type();
                let name = serializer
                    .contract_name_by_type(ty)
                    .ok_or_else(|| TransportError::ContractNameMissing(ty.name().to_string()))?;
                let _guard = profiler.track_message(envelope.id().as_str(), &name);
                serializer.serialize(&**payload, &mut content)?;
                name
            }
            ItemContent::Opaque { contract_name, bytes } => {
                content.extend_from_slice(bytes);
                contract_name.clone()
            }
        };

        items.push(ItemContract {
            contract_name,
            content_size: (content.len() - start) as u64,
            attributes: item_attributes_to_contract(item.attributes())?,
        });
    }

    let contract = EnvelopeContract {
        envelope_id: envelope.id().as_str().to_string(),
        envelope_attributes: envelope_attributes_to_contract(envelope.attributes())?,
        items,
        deliver_on_utc: envelope.deliver_on_utc(),
    };

    let mut out = vec![0u8; MessageHeader::FIXED_SIZE];
    serde_json::to_writer(&mut out, &contract)?;
    let attributes_length = (out.len() - MessageHeader::FIXED_SIZE) as u64;
    out.extend_from_slice(&content);

    MessageHeader::for_schema2_data(attributes_length, content.len() as u64).write_to(&mut out)?;

    debug!(
        "Encoded envelope {} ({} items, {} bytes)",
        envelope.id(),
        contract.items.len(),
        out.len()
    );
    Ok(out)
}

fn decode_with(
    buffer: &[u8],
    serializer: &dyn MessageSerializer,
    profiler: &dyn EngineProfiler,
) -> TransportResult<MessageEnvelope> {
    let header = MessageHeader::read_from(buffer)?;

    let total = header.total_length();
    if total > buffer.len() as u64 {
        return Err(TransportError::Truncated {
            need: total,
            have: buffer.len() as u64,
        });
    }
    if total < buffer.len() as u64 {
        return Err(TransportError::LengthMismatch {
            declared: total,
            actual: buffer.len() as u64,
        });
    }

    let contract_start = MessageHeader::FIXED_SIZE;
    let contract_end = contract_start + to_usize(header.attributes_length, buffer.len())?;
    let content_end = contract_end + to_usize(header.content_length, buffer.len())?;

    let contract: EnvelopeContract = serde_json::from_slice(&buffer[contract_start..contract_end])?;

    let mut items = Vec::with_capacity(contract.items.len());
    let mut offset = contract_end;

    for item in contract.items {
        let size = to_usize(item.content_size, buffer.len())?;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= content_end)
            .ok_or_else(|| TransportError::Truncated {
                need: (offset as u64).saturating_add(item.content_size),
                have: content_end as u64,
            })?;
        let slice = &buffer[offset..end];
        let attributes = item_attributes_from_contract(&item.attributes)?;

        let decoded = match serializer.type_by_contract_name(&item.contract_name) {
            Some(ty) => {
                let _guard = profiler.track_message(&contract.envelope_id, &item.contract_name);
                MessageItem::from_boxed(serializer.deserialize(slice, ty)?, attributes)
            }
            None => {
                warn!(
                    "Unknown contract {} in envelope {}, keeping {} raw bytes",
                    item.contract_name, contract.envelope_id, size
                );
                MessageItem::opaque(item.contract_name, slice.to_vec(), attributes)
            }
        };
        items.push(decoded);
        offset = end;
    }
    if offset != content_end {
        return Err(TransportError::LengthMismatch {
            declared: (content_end - contract_end) as u64,
            actual: (offset - contract_end) as u64,
        });
    }

    let attributes = envelope_attributes_from_contract(&contract.envelope_attributes)?;

    debug!(
        "Decoded envelope {} ({} items, {} bytes)",
        contract.envelope_id,
        items.len(),
        buffer.len()
    );

    Ok(MessageEnvelope::new(
        EnvelopeId::from(contract.envelope_id),
        attributes,
        items,
        contract.deliver_on_utc,
    ))
}

/// Envelope codec bound to a payload serializer and a profiler.
pub struct EnvelopeCodec<S> {
    serializer: S,
    config: CodecConfig,
    profiler: Box<dyn EngineProfiler>,
}

impl<S: MessageSerializer> EnvelopeCodec<S> {
    pub fn new(serializer: S) -> Self {
        Self::with_config(serializer, CodecConfig::default())
    }

    pub fn with_config(serializer: S, config: CodecConfig) -> Self {
        Self {
            serializer,
            config,
            profiler: Box::new(NullProfiler),
        }
    }

    /// Replaces the profiler.
    #[must_use]
    pub fn with_profiler(mut self, profiler: impl EngineProfiler + 'static) -> Self {
        self.profiler = Box::new(profiler);
        self
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn check_size(&self, size: usize) -> TransportResult<()> {
        if size > self.config.max_message_size {
            return Err(TransportError::TooLarge {
                size,
                limit: self.config.max_message_size,
            });
        }
        Ok(())
    }

    /// Encodes `envelope` into a data message.
    pub fn encode(&self, envelope: &MessageEnvelope) -> TransportResult<Vec<u8>> {
        let _guard: ProfileGuard = self.profiler.track_context("encode");
        let bytes = encode_with(envelope, &self.serializer, &*self.profiler)?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Decodes a data message.
    pub fn decode(&self, buffer: &[u8]) -> TransportResult<MessageEnvelope> {
        self.check_size(buffer.len())?;
        let _guard: ProfileGuard = self.profiler.track_context("decode");
        decode_with(buffer, &self.serializer, &*self.profiler)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for EnvelopeCodec<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("serializer", &self.serializer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
