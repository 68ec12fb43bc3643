//! Property tests for the envelope codec and reference framing.

use cqrs_transport::{
    decode_envelope, encode_envelope, encode_reference, is_reference, try_decode_reference, JsonMessageSerializer,
    MessageHeader,
};
use cqrs_types::{AttributeValue, MessageEnvelope, MessageItem, MessageReference};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
    tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter(i64);

fn registry() -> JsonMessageSerializer {
    JsonMessageSerializer::new()
        .with::<Note>("Note")
        .with::<Counter>("Counter")
}

fn attribute_value() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<String>().prop_map(AttributeValue::Text),
        any::<i64>().prop_map(AttributeValue::Number),
    ]
}

fn item() -> impl Strategy<Value = MessageItem> {
    let note = (any::<String>(), prop::collection::vec(any::<String>(), 0..3))
        .prop_map(|(text, tags)| MessageItem::new(Note { text, tags }));
    let counter = any::<i64>().prop_map(|n| MessageItem::new(Counter(n)));
    (
        prop_oneof![note, counter],
        prop::collection::btree_map("[a-z]{1,8}", attribute_value(), 0..3),
    )
        .prop_map(|(mut item, attributes)| {
            for (key, value) in attributes {
                item = item.with_attribute(key, value);
            }
            item
        })
}

fn envelope() -> impl Strategy<Value = MessageEnvelope> {
    (
        "[A-Za-z0-9-]{1,36}",
        prop::collection::vec(item(), 0..5),
        prop::collection::btree_map("[a-z]{1,8}", attribute_value(), 0..4),
        proptest::option::of(0i64..4_000_000_000),
    )
        .prop_map(|(id, items, attributes, deliver)| {
            let mut builder = MessageEnvelope::builder(id);
            for item in items {
                builder = builder.add_item(item);
            }
            for (key, value) in attributes {
                builder = builder.add_attribute(key, value);
            }
            if let Some(secs) = deliver {
                if let Some(at) = chrono::DateTime::from_timestamp(secs, 0) {
                    builder = builder.deliver_on(at);
                }
            }
            builder.build()
        })
}

fn field() -> impl Strategy<Value = String> {
    "[^\r\n]{1,24}"
}

proptest! {
    #[test]
    fn envelope_roundtrip(env in envelope()) {
        let serializer = registry();
        let bytes = encode_envelope(&env, &serializer).unwrap();
        prop_assert_eq!(decode_envelope(&bytes, &serializer).unwrap(), env);
    }

    #[test]
    fn header_lengths_cover_buffer(env in envelope()) {
        let bytes = encode_envelope(&env, &registry()).unwrap();
        let header = MessageHeader::read_from(&bytes).unwrap();
        prop_assert_eq!(header.total_length(), bytes.len() as u64);
        prop_assert!(!is_reference(&bytes));
    }

    #[test]
    fn truncation_never_panics(env in envelope(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_envelope(&env, &registry()).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(decode_envelope(&bytes[..cut], &registry()).is_err());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_envelope(&bytes, &registry());
        let _ = try_decode_reference(&bytes);
    }

    #[test]
    fn reference_roundtrip(id in field(), container in field(), reference in field()) {
        let original = MessageReference::new(id, container, reference);
        let bytes = encode_reference(&original).unwrap();
        prop_assert!(is_reference(&bytes));
        prop_assert_eq!(try_decode_reference(&bytes).unwrap(), Some(original));
    }
}
