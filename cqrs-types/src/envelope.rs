//! Message envelopes, items and references.
//!
//! An envelope is the unit of transport: an identified bundle of ordered
//! payload items plus attributes. Envelopes are immutable once built; use
//! [`EnvelopeBuilder`] to assemble one per send.

use crate::attributes::{AttributeValue, Attributes};
use crate::ids::EnvelopeId;
use crate::payload::{MappedType, Payload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contents of a message item.
#[derive(Debug)]
pub enum ItemContent {
    /// A payload whose type was known to the serializer.
    Typed(Box<dyn Payload>),

    /// Raw bytes of a payload whose contract name could not be resolved
    /// on decode. Re-encoding writes the bytes back verbatim.
    Opaque { contract_name: String, bytes: Vec<u8> },
}

impl Clone for ItemContent {
    fn clone(&self) -> Self {
        match self {
            Self::Typed(payload) => Self::Typed((**payload).clone_payload()),
            Self::Opaque {
                contract_name,
                bytes,
            } => Self::Opaque {
                contract_name: contract_name.clone(),
                bytes: bytes.clone(),
            },
        }
    }
}

impl PartialEq for ItemContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Typed(a), Self::Typed(b)) => (**a).eq_payload(&**b),
            (
                Self::Opaque {
                    contract_name: na,
                    bytes: ba,
                },
                Self::Opaque {
                    contract_name: nb,
                    bytes: bb,
                },
            ) => na == nb && ba == bb,
            _ => false,
        }
    }
}

/// One payload within an envelope, with its own attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageItem {
    content: ItemContent,
    attributes: Attributes,
}

impl MessageItem {
    /// Creates an item from a typed payload.
    pub fn new<T: Payload>(payload: T) -> Self {
        Self::from_boxed(Box::new(payload), Attributes::new())
    }

    pub fn from_boxed(payload: Box<dyn Payload>, attributes: Attributes) -> Self {
        Self {
            content: ItemContent::Typed(payload),
            attributes,
        }
    }

    /// Creates an item holding undecoded bytes.
    pub fn opaque(contract_name: impl Into<String>, bytes: Vec<u8>, attributes: Attributes) -> Self {
        Self {
            content: ItemContent::Opaque {
                contract_name: contract_name.into(),
                bytes,
            },
            attributes,
        }
    }

    /// Adds an item attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Type of the payload, or `None` for opaque items.
    #[must_use]
    pub fn mapped_type(&self) -> Option<MappedType> {
        match &self.content {
            ItemContent::Typed(payload) => Some((**payload).mapped_type()),
            ItemContent::Opaque { .. } => None,
        }
    }

    #[must_use]
    pub const fn content(&self) -> &ItemContent {
        &self.content
    }

    /// Typed view of the payload, if it is a `T`.
    #[must_use]
    pub fn payload<T: Payload>(&self) -> Option<&T> {
        match &self.content {
            ItemContent::Typed(payload) => (**payload).downcast_ref::<T>(),
            ItemContent::Opaque { .. } => None,
        }
    }

    /// Raw bytes of an opaque item.
    #[must_use]
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            ItemContent::Opaque { bytes, .. } => Some(bytes),
            ItemContent::Typed(_) => None,
        }
    }

    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// The unit of transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    id: EnvelopeId,
    attributes: Attributes,
    items: Vec<MessageItem>,
    deliver_on_utc: Option<DateTime<Utc>>,
}

impl MessageEnvelope {
    pub fn new(
        id: EnvelopeId,
        attributes: Attributes,
        items: Vec<MessageItem>,
        deliver_on_utc: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            attributes,
            items,
            deliver_on_utc,
        }
    }

    /// Starts building an envelope with the given id.
    pub fn builder(id: impl Into<EnvelopeId>) -> EnvelopeBuilder {
        EnvelopeBuilder::new(id.into())
    }

    #[must_use]
    pub const fn id(&self) -> &EnvelopeId {
        &self.id
    }

    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    #[must_use]
    pub fn items(&self) -> &[MessageItem] {
        &self.items
    }

    #[must_use]
    pub const fn deliver_on_utc(&self) -> Option<DateTime<Utc>> {
        self.deliver_on_utc
    }
}

/// Mutable assembly stage for a [`MessageEnvelope`].
#[derive(Debug)]
pub struct EnvelopeBuilder {
    id: EnvelopeId,
    attributes: Attributes,
    items: Vec<MessageItem>,
    deliver_on_utc: Option<DateTime<Utc>>,
}

impl EnvelopeBuilder {
    pub fn new(id: EnvelopeId) -> Self {
        Self {
            id,
            attributes: Attributes::new(),
            items: Vec::new(),
            deliver_on_utc: None,
        }
    }

    /// Appends a typed payload as a new item.
    #[must_use]
    pub fn add_content<T: Payload>(self, payload: T) -> Self {
        self.add_item(MessageItem::new(payload))
    }

    #[must_use]
    pub fn add_item(mut self, item: MessageItem) -> Self {
        self.items.push(item);
        self
    }

    #[must_use]
    pub fn add_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn deliver_on(mut self, at: DateTime<Utc>) -> Self {
        self.deliver_on_utc = Some(at);
        self
    }

    pub fn build(self) -> MessageEnvelope {
        MessageEnvelope::new(self.id, self.attributes, self.items, self.deliver_on_utc)
    }
}

/// Pointer to an envelope stored out of band.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageReference {
    pub envelope_id: String,
    pub storage_container: String,
    pub storage_reference: String,
}

impl MessageReference {
    pub fn new(
        envelope_id: impl Into<String>,
        storage_container: impl Into<String>,
        storage_reference: impl Into<String>,
    ) -> Self {
        Self {
            envelope_id: envelope_id.into(),
            storage_container: storage_container.into(),
            storage_reference: storage_reference.into(),
        }
    }
}
