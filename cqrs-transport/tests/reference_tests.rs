//! Tests for reference framing and frame discrimination.

use cqrs_transport::{
    encode_envelope, encode_reference, is_reference, read_frame, try_decode_reference, EnvelopeCodec,
    EnvelopeSerializer, Frame, JsonMessageSerializer, TransportError, REFERENCE_SIGNATURE,
};
use cqrs_types::{MessageEnvelope, MessageReference};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

fn registry() -> JsonMessageSerializer {
    JsonMessageSerializer::new().with::<Ping>("Ping")
}

fn sample_reference() -> MessageReference {
    MessageReference::new("E1", "overflow", "2024/05/E1.bin")
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

// ── Encoding ──────────────────────────────────────────────────────

#[test]
fn reference_layout_is_utf16le_lines() {
    let bytes = encode_reference(&sample_reference()).unwrap();
    let expected = utf16le(&format!("{REFERENCE_SIGNATURE}\r\nE1\r\noverflow\r\n2024/05/E1.bin"));
    assert_eq!(bytes, expected);
    assert_eq!(&bytes[..2], &[b'[', 0]);
}

#[test]
fn reference_roundtrip() {
    let reference = MessageReference::new("Ünïcode-id", "container ✓", "blob/ref");
    let bytes = encode_reference(&reference).unwrap();
    assert_eq!(try_decode_reference(&bytes).unwrap(), Some(reference));
}

#[test]
fn empty_field_rejected() {
    let err = encode_reference(&MessageReference::new("E1", "", "ref")).unwrap_err();
    assert!(matches!(err, TransportError::InvalidReference(_)));
}

#[test]
fn field_with_separator_rejected() {
    let err = encode_reference(&MessageReference::new("E1", "views", "a\r\nb")).unwrap_err();
    assert!(matches!(err, TransportError::InvalidReference(_)));
}

// ── Detection ─────────────────────────────────────────────────────

#[test]
fn data_message_is_not_a_reference() {
    let envelope = MessageEnvelope::builder("E1").add_content(Ping { seq: 1 }).build();
    let bytes = encode_envelope(&envelope, &registry()).unwrap();

    assert!(!is_reference(&bytes));
    assert_eq!(try_decode_reference(&bytes).unwrap(), None);
}

#[test]
fn short_and_empty_buffers_are_not_references() {
    assert!(!is_reference(&[]));
    assert!(!is_reference(&[b'[', 0]));
    assert_eq!(try_decode_reference(&[]).unwrap(), None);
}

#[test]
fn signature_alone_is_invalid() {
    let err = try_decode_reference(&utf16le(REFERENCE_SIGNATURE)).unwrap_err();
    assert!(matches!(err, TransportError::InvalidReference(_)));
}

#[test]
fn missing_fields_are_invalid() {
    let bytes = utf16le(&format!("{REFERENCE_SIGNATURE}\r\nE1\r\nviews"));
    let err = try_decode_reference(&bytes).unwrap_err();
    assert!(matches!(err, TransportError::InvalidReference(ref msg) if msg.contains("storage reference")));
}

#[test]
fn extra_fields_are_invalid() {
    let bytes = utf16le(&format!("{REFERENCE_SIGNATURE}\r\nE1\r\nviews\r\nref\r\nleftover"));
    let err = try_decode_reference(&bytes).unwrap_err();
    assert!(matches!(err, TransportError::InvalidReference(ref msg) if msg.contains("unexpected field")));
}

#[test]
fn odd_length_is_invalid() {
    let mut bytes = encode_reference(&sample_reference()).unwrap();
    bytes.push(0x41);
    assert!(try_decode_reference(&bytes).is_err());
}

// ── Frames ────────────────────────────────────────────────────────

#[test]
fn read_frame_discriminates_both_ways() {
    let serializer = registry();
    let envelope = MessageEnvelope::builder("E1").add_content(Ping { seq: 4 }).build();

    let data = encode_envelope(&envelope, &serializer).unwrap();
    let reference = encode_reference(&sample_reference()).unwrap();

    assert_eq!(read_frame(&data, &serializer).unwrap(), Frame::Data(envelope));
    assert_eq!(
        read_frame(&reference, &serializer).unwrap(),
        Frame::Reference(sample_reference())
    );
}

#[test]
fn codec_serializer_trait() {
    let codec = EnvelopeCodec::new(registry());

    let reference = codec.save_reference_message(&sample_reference()).unwrap();
    assert_eq!(codec.try_read_as_reference(&reference).unwrap(), Some(sample_reference()));

    let envelope = MessageEnvelope::builder("E2").add_content(Ping { seq: 9 }).build();
    let data = codec.save_data_message(&envelope).unwrap();
    assert_eq!(codec.try_read_as_reference(&data).unwrap(), None);

    match codec.read_frame(&data).unwrap() {
        Frame::Data(decoded) => assert_eq!(decoded, envelope),
        Frame::Reference(r) => panic!("expected data frame, got {:?}", r),
    }
}

#[test]
fn reference_is_not_parsed_as_data() {
    let codec = EnvelopeCodec::new(registry());
    let reference = codec.save_reference_message(&sample_reference()).unwrap();

    // '[' then 0x00 is not the data format tag.
    let err = codec.read_data_message(&reference).unwrap_err();
    assert!(matches!(err, TransportError::UnsupportedFormat { .. }));
}
