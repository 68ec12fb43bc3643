//! Tests for the envelope codec: round trips, degradation and error paths.

use chrono::{TimeZone, Utc};
use cqrs_transport::contract::{AttributeContract, EnvelopeContract, ItemContract};
use cqrs_transport::{
    decode_envelope, encode_envelope, CodecConfig, EnvelopeCodec, EnvelopeSerializer,
    JsonMessageSerializer, MessageHeader, TracingProfiler, TransportError, SCHEMA2_DATA_FORMAT,
};
use cqrs_types::{keys, AttributeValue, MappedType, MessageEnvelope, MessageItem};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Pong {
    seq: u32,
    note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Unregistered;

fn full_registry() -> JsonMessageSerializer {
    JsonMessageSerializer::new()
        .with::<Ping>("Ping")
        .with::<Pong>("Pong")
}

/// Helper: frame a hand-built contract region plus content.
fn frame(contract: &EnvelopeContract, content: &[u8]) -> Vec<u8> {
    let region = serde_json::to_vec(contract).unwrap();
    let mut buf = vec![0u8; MessageHeader::FIXED_SIZE];
    MessageHeader::for_schema2_data(region.len() as u64, content.len() as u64)
        .write_to(&mut buf)
        .unwrap();
    buf.extend_from_slice(&region);
    buf.extend_from_slice(content);
    buf
}

// ── Round trips ───────────────────────────────────────────────────

#[test]
fn test_ping_scenario() {
    let envelope = MessageEnvelope::builder("E1")
        .add_content(Ping { seq: 1 })
        .add_attribute(keys::SENDER, "svc-a")
        .build();

    let serializer = full_registry();
    let bytes = encode_envelope(&envelope, &serializer).unwrap();
    let decoded = decode_envelope(&bytes, &serializer).unwrap();

    assert_eq!(decoded.id().as_str(), "E1");
    assert_eq!(decoded.items().len(), 1);
    assert_eq!(decoded.items()[0].payload::<Ping>().map(|p| p.seq), Some(1));
    assert_eq!(
        decoded.attribute(keys::SENDER),
        Some(&AttributeValue::Text("svc-a".into()))
    );
}

#[test]
fn test_roundtrip_preserves_order_and_attributes() {
    let created = Utc.timestamp_opt(1_300_000_000, 987_654_321).unwrap();
    let deliver = Utc.with_ymd_and_hms(2031, 5, 6, 7, 8, 9).unwrap();

    let envelope = MessageEnvelope::builder("E2")
        .add_item(MessageItem::new(Pong { seq: 1, note: "first".into() }).with_attribute("hops", 3i16))
        .add_content(Ping { seq: 2 })
        .add_item(MessageItem::new(Ping { seq: 3 }).with_attribute("route", "eu-west"))
        .add_attribute(keys::CREATED_UTC, created)
        .add_attribute(keys::SENDER, "svc-b")
        .add_attribute("tenant", "acme")
        .add_attribute("priority", 7i32)
        .add_attribute("big", i64::MIN)
        .deliver_on(deliver)
        .build();

    let serializer = full_registry();
    let bytes = encode_envelope(&envelope, &serializer).unwrap();
    let decoded = decode_envelope(&bytes, &serializer).unwrap();

    assert_eq!(decoded, envelope);
    assert_eq!(decoded.attribute(keys::CREATED_UTC), Some(&AttributeValue::Timestamp(created)));
    assert_eq!(decoded.attribute("big"), Some(&AttributeValue::Number(i64::MIN)));
    assert_eq!(decoded.deliver_on_utc(), Some(deliver));
}

#[test]
fn test_roundtrip_empty_envelope() {
    let envelope = MessageEnvelope::builder("empty").build();
    let serializer = full_registry();
    let bytes = encode_envelope(&envelope, &serializer).unwrap();
    assert_eq!(decode_envelope(&bytes, &serializer).unwrap(), envelope);
}

#[test]
fn test_strings_survive_byte_for_byte() {
    let text = "multi\r\nline ünïcødé \u{1F680} \"quoted\"";
    let envelope = MessageEnvelope::builder("E3")
        .add_attribute("note", text)
        .add_item(MessageItem::new(Ping { seq: 0 }).with_attribute("note", text))
        .build();

    let serializer = full_registry();
    let decoded = decode_envelope(&encode_envelope(&envelope, &serializer).unwrap(), &serializer).unwrap();
    assert_eq!(decoded.attribute("note").and_then(|v| v.as_text()), Some(text));
    assert_eq!(
        decoded.items()[0].attributes().get("note").and_then(|v| v.as_text()),
        Some(text)
    );
}

// ── Layout ────────────────────────────────────────────────────────

#[test]
fn test_header_describes_buffer() {
    let envelope = MessageEnvelope::builder("E1")
        .add_content(Ping { seq: 1 })
        .add_content(Pong { seq: 2, note: "x".into() })
        .build();
    let bytes = encode_envelope(&envelope, &full_registry()).unwrap();

    let header = MessageHeader::read_from(&bytes).unwrap();
    assert_eq!(header.format_version, SCHEMA2_DATA_FORMAT);
    assert_eq!(&bytes[0..4], &SCHEMA2_DATA_FORMAT.to_be_bytes());
    assert_eq!(header.total_length(), bytes.len() as u64);

    let expected_content = [
        serde_json::to_vec(&Ping { seq: 1 }).unwrap(),
        serde_json::to_vec(&Pong { seq: 2, note: "x".into() }).unwrap(),
    ]
    .concat();
    assert_eq!(header.content_length, expected_content.len() as u64);
    assert_eq!(&bytes[bytes.len() - expected_content.len()..], &expected_content[..]);
}

#[test]
fn test_item_sizes_match_content_blocks() {
    let envelope = MessageEnvelope::builder("E1")
        .add_content(Ping { seq: 10 })
        .add_content(Ping { seq: 200 })
        .build();
    let bytes = encode_envelope(&envelope, &full_registry()).unwrap();

    let header = MessageHeader::read_from(&bytes).unwrap();
    let start = MessageHeader::FIXED_SIZE;
    let end = start + header.attributes_length as usize;
    let contract: EnvelopeContract = serde_json::from_slice(&bytes[start..end]).unwrap();

    let sizes: Vec<u64> = contract.items.iter().map(|i| i.content_size).collect();
    assert_eq!(sizes, vec![10, 11]);
    assert_eq!(sizes.iter().sum::<u64>(), header.content_length);
}

// ── Unknown types ─────────────────────────────────────────────────

#[test]
fn test_unknown_contract_degrades_to_raw_bytes() {
    let pong = Pong { seq: 5, note: "kept".into() };
    let envelope = MessageEnvelope::builder("E4")
        .add_content(Ping { seq: 1 })
        .add_item(MessageItem::new(pong.clone()).with_attribute("hops", 2i64))
        .build();

    let bytes = encode_envelope(&envelope, &full_registry()).unwrap();
    let receiver = JsonMessageSerializer::new().with::<Ping>("Ping");
    let decoded = decode_envelope(&bytes, &receiver).unwrap();

    assert_eq!(decoded.items()[0].payload::<Ping>(), Some(&Ping { seq: 1 }));

    let raw = &decoded.items()[1];
    assert_eq!(raw.mapped_type(), None);
    assert_eq!(raw.raw_bytes(), Some(serde_json::to_vec(&pong).unwrap().as_slice()));
    assert_eq!(raw.attributes().get("hops"), Some(&AttributeValue::Number(2)));
}

#[test]
fn test_raw_items_forward_unchanged() {
    let envelope = MessageEnvelope::builder("E5")
        .add_content(Pong { seq: 9, note: "relay".into() })
        .build();

    let bytes = encode_envelope(&envelope, &full_registry()).unwrap();

    // A relay that does not know Pong decodes and re-encodes the envelope.
    let relay = JsonMessageSerializer::new();
    let relayed = decode_envelope(&bytes, &relay).unwrap();
    let forwarded = encode_envelope(&relayed, &relay).unwrap();
    assert_eq!(forwarded, bytes);

    let decoded = decode_envelope(&forwarded, &full_registry()).unwrap();
    assert_eq!(decoded, envelope);
    assert_eq!(decoded.items()[0].mapped_type(), Some(MappedType::of::<Pong>()));
}

// ── Encode errors ─────────────────────────────────────────────────

#[test]
fn test_missing_contract_name_fails_whole_envelope() {
    let envelope = MessageEnvelope::builder("E6")
        .add_content(Ping { seq: 1 })
        .add_content(Unregistered)
        .build();

    let err = encode_envelope(&envelope, &full_registry()).unwrap_err();
    match err {
        TransportError::ContractNameMissing(name) => assert!(name.ends_with("Unregistered")),
        other => panic!("expected ContractNameMissing, got {:?}", other),
    }
}

#[test]
fn test_custom_timestamp_attribute_is_unsupported() {
    let envelope = MessageEnvelope::builder("E7")
        .add_attribute("seen", Utc::now())
        .build();

    let err = encode_envelope(&envelope, &full_registry()).unwrap_err();
    assert!(matches!(
        err,
        TransportError::UnsupportedAttributeValue { ref key, kind: "timestamp" } if key == "seen"
    ));
}

#[test]
fn test_created_utc_must_be_timestamp() {
    let envelope = MessageEnvelope::builder("E8")
        .add_attribute(keys::CREATED_UTC, "yesterday")
        .build();

    let err = encode_envelope(&envelope, &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::UnsupportedAttributeValue { kind: "string", .. }));
}

#[test]
fn test_timestamp_item_attribute_not_implemented() {
    let envelope = MessageEnvelope::builder("E9")
        .add_item(MessageItem::new(Ping { seq: 1 }).with_attribute("at", Utc::now()))
        .build();

    let err = encode_envelope(&envelope, &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::NotImplemented(_)));
}

// ── Decode errors ─────────────────────────────────────────────────

#[test]
fn test_wrong_format_tag_rejected() {
    let envelope = MessageEnvelope::builder("E1").add_content(Ping { seq: 1 }).build();
    let mut bytes = encode_envelope(&envelope, &full_registry()).unwrap();
    bytes[0..4].copy_from_slice(&7u32.to_be_bytes());

    let err = decode_envelope(&bytes, &full_registry()).unwrap_err();
    assert!(matches!(
        err,
        TransportError::UnsupportedFormat { found: 7, expected: SCHEMA2_DATA_FORMAT }
    ));
}

#[test]
fn test_buffer_shorter_than_header() {
    let err = decode_envelope(&[0, 0, 0, 2, 0], &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::Truncated { need: 20, have: 5 }));
}

#[test]
fn test_truncated_content_rejected() {
    let envelope = MessageEnvelope::builder("E1").add_content(Ping { seq: 1 }).build();
    let bytes = encode_envelope(&envelope, &full_registry()).unwrap();

    let err = decode_envelope(&bytes[..bytes.len() - 1], &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::Truncated { .. }));
}

#[test]
fn test_item_size_beyond_content_rejected() {
    let contract = EnvelopeContract {
        envelope_id: "E1".into(),
        envelope_attributes: vec![],
        items: vec![ItemContract {
            contract_name: "Ping".into(),
            content_size: 64,
            attributes: vec![],
        }],
        deliver_on_utc: None,
    };
    let bytes = frame(&contract, br#"{"seq":1}"#);

    let err = decode_envelope(&bytes, &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::Truncated { .. }));
}

#[test]
fn test_trailing_bytes_rejected() {
    let envelope = MessageEnvelope::builder("E1").add_content(Ping { seq: 1 }).build();
    let mut bytes = encode_envelope(&envelope, &full_registry()).unwrap();
    let declared = bytes.len() as u64;
    bytes.extend_from_slice(b"extra");

    let err = decode_envelope(&bytes, &full_registry()).unwrap_err();
    assert!(matches!(
        err,
        TransportError::LengthMismatch { declared: d, actual } if d == declared && actual == declared + 5
    ));
}

#[test]
fn test_item_sizes_short_of_content_rejected() {
    let contract = EnvelopeContract {
        envelope_id: "E1".into(),
        envelope_attributes: vec![],
        items: vec![ItemContract {
            contract_name: "Ping".into(),
            content_size: 9,
            attributes: vec![],
        }],
        deliver_on_utc: None,
    };
    // 9 bytes of payload followed by 4 bytes no item claims.
    let bytes = frame(&contract, br#"{"seq":1}junk"#);

    let err = decode_envelope(&bytes, &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::LengthMismatch { declared: 13, actual: 9 }));
}

#[test]
fn test_unknown_discriminant_is_corrupt() {
    let contract = EnvelopeContract {
        envelope_id: "E1".into(),
        envelope_attributes: vec![AttributeContract {
            kind: 42,
            custom_name: Some("x".into()),
            string_value: Some("y".into()),
            number_value: None,
        }],
        items: vec![],
        deliver_on_utc: None,
    };

    let err = decode_envelope(&frame(&contract, &[]), &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::CorruptAttribute(42)));
}

#[test]
fn test_invalid_created_utc_text() {
    let contract = EnvelopeContract {
        envelope_id: "E1".into(),
        envelope_attributes: vec![AttributeContract {
            kind: 1,
            custom_name: None,
            string_value: Some("not a date".into()),
            number_value: None,
        }],
        items: vec![],
        deliver_on_utc: None,
    };

    let err = decode_envelope(&frame(&contract, &[]), &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::InvalidTimestamp(_)));
}

#[test]
fn test_garbage_contract_region() {
    let mut bytes = vec![0u8; MessageHeader::FIXED_SIZE];
    MessageHeader::for_schema2_data(4, 0).write_to(&mut bytes).unwrap();
    bytes.extend_from_slice(b"nope");

    let err = decode_envelope(&bytes, &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::Serialization(_)));
}

#[test]
fn test_known_contract_with_bad_payload() {
    let contract = EnvelopeContract {
        envelope_id: "E1".into(),
        envelope_attributes: vec![],
        items: vec![ItemContract {
            contract_name: "Ping".into(),
            content_size: 3,
            attributes: vec![],
        }],
        deliver_on_utc: None,
    };

    let err = decode_envelope(&frame(&contract, b"???"), &full_registry()).unwrap_err();
    assert!(matches!(err, TransportError::Payload(_)));
}

// ── EnvelopeCodec ─────────────────────────────────────────────────

#[test]
fn test_codec_size_limit() {
    let codec = EnvelopeCodec::with_config(full_registry(), CodecConfig { max_message_size: 32 });
    let envelope = MessageEnvelope::builder("E1")
        .add_content(Pong { seq: 1, note: "x".repeat(64) })
        .build();

    let err = codec.save_data_message(&envelope).unwrap_err();
    assert!(matches!(err, TransportError::TooLarge { limit: 32, .. }));

    let err = codec.read_data_message(&[0u8; 64]).unwrap_err();
    assert!(matches!(err, TransportError::TooLarge { size: 64, limit: 32 }));
}

#[test]
fn test_codec_with_tracing_profiler() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let codec = EnvelopeCodec::new(full_registry()).with_profiler(TracingProfiler);
    let envelope = MessageEnvelope::builder("E1")
        .add_content(Ping { seq: 1 })
        .add_content(Pong { seq: 2, note: "n".into() })
        .build();

    let bytes = codec.save_data_message(&envelope).unwrap();
    assert_eq!(codec.read_data_message(&bytes).unwrap(), envelope);
}

#[test]
fn test_codec_default_config() {
    let codec = EnvelopeCodec::new(full_registry());
    assert_eq!(codec.config().max_message_size, 16 * 1024 * 1024);
    assert_eq!(codec.serializer().len(), 2);
}
