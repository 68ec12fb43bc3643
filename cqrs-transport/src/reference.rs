//! Reference framing.
//!
//! A reference message is UTF-16LE text: the signature literal followed by
//! the envelope id, storage container and storage reference, joined with
//! `\r\n`. It shares the opaque-bytes transport with data messages, so
//! readers must check for the signature before parsing a data header.

use crate::error::{TransportError, TransportResult};
use cqrs_types::MessageReference;
use std::sync::LazyLock;

/// Signature text at the start of every reference message.
pub const REFERENCE_SIGNATURE: &str = "[cqrs-ref-r1]";

const SEPARATOR: &str = "\r\n";

static SIGNATURE_BYTES: LazyLock<Vec<u8>> = LazyLock::new(|| utf16le(REFERENCE_SIGNATURE));

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn check_field(name: &str, value: &str) -> TransportResult<()> {
    if value.is_empty() {
        return Err(TransportError::InvalidReference(format!("{name} is empty")));
    }
    if value.contains(SEPARATOR) {
        return Err(TransportError::InvalidReference(format!(
            "{name} contains a line separator"
        )));
    }
    Ok(())
}

/// Encodes a reference message.
///
/// Fields must be non-empty and free of `\r\n`, otherwise they could not
/// be split back apart.
pub fn encode_reference(reference: &MessageReference) -> TransportResult<Vec<u8>> {
    check_field("envelope id", &reference.envelope_id)?;
    check_field("storage container", &reference.storage_container)?;
    check_field("storage reference", &reference.storage_reference)?;

    let text = [
        REFERENCE_SIGNATURE,
        reference.envelope_id.as_str(),
        reference.storage_container.as_str(),
        reference.storage_reference.as_str(),
    ]
    .join(SEPARATOR);

    Ok(utf16le(&text))
}

/// Returns true if `buffer` starts with the reference signature.
#[must_use]
pub fn is_reference(buffer: &[u8]) -> bool {
    buffer.starts_with(&SIGNATURE_BYTES)
}

/// Decodes `buffer` as a reference if it carries the signature.
///
/// Returns `Ok(None)` for anything else, which should be handed to the
/// data codec.
pub fn try_decode_reference(buffer: &[u8]) -> TransportResult<Option<MessageReference>> {
    if !is_reference(buffer) {
        return Ok(None);
    }

    let (units, rest) = buffer.as_chunks::<2>();
    if !rest.is_empty() {
        return Err(TransportError::InvalidReference("odd byte length".to_string()));
    }
    let units: Vec<u16> = units.iter().map(|pair| u16::from_le_bytes(*pair)).collect();
    let text = String::from_utf16(&units)
        .map_err(|e| TransportError::InvalidReference(format!("not UTF-16: {e}")))?;

    let mut parts = text.split(SEPARATOR).filter(|part| !part.is_empty()).skip(1);
    let mut next = |name: &str| {
        parts
            .next()
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidReference(format!("missing {name}")))
    };

    let envelope_id = next("envelope id")?;
    let storage_container = next("storage container")?;
    let storage_reference = next("storage reference")?;
    if parts.next().is_some() {
        return Err(TransportError::InvalidReference("unexpected field after storage reference".to_string()));
    }

    Ok(Some(MessageReference {
        envelope_id,
        storage_container,
        storage_reference,
    }))
}
