//! Envelope-contract region of a data message.
//!
//! The region sits between the header and the item contents. It carries
//! the envelope id, discriminated attribute records, one contract record
//! per item (contract name, content size, attributes) and the optional
//! delivery time. It is encoded as JSON.

use crate::error::{TransportError, TransportResult};
use chrono::{DateTime, SecondsFormat, Utc};
use cqrs_types::{keys, AttributeValue, Attributes};
use serde::{Deserialize, Serialize};

/// Wire discriminant of an attribute record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttributeKind {
    CreatedUtc = 1,
    Sender = 2,
    CustomString = 3,
    CustomNumber = 4,
}

impl TryFrom<u8> for AttributeKind {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::CreatedUtc),
            2 => Ok(Self::Sender),
            3 => Ok(Self::CustomString),
            4 => Ok(Self::CustomNumber),
            other => Err(TransportError::CorruptAttribute(other)),
        }
    }
}

/// One attribute record. Which value field is set depends on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeContract {
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_value: Option<i64>,
}

impl AttributeContract {
    fn string(kind: AttributeKind, custom_name: Option<String>, value: String) -> Self {
        Self {
            kind: kind as u8,
            custom_name,
            string_value: Some(value),
            number_value: None,
        }
    }

    fn number(custom_name: String, value: i64) -> Self {
        Self {
            kind: AttributeKind::CustomNumber as u8,
            custom_name: Some(custom_name),
            string_value: None,
            number_value: Some(value),
        }
    }

    fn require_name(&self) -> TransportResult<String> {
        self.custom_name
            .clone()
            .ok_or_else(|| TransportError::MalformedAttribute(format!("kind {} without name", self.kind)))
    }

    fn require_string(&self) -> TransportResult<String> {
        self.string_value
            .clone()
            .ok_or_else(|| TransportError::MalformedAttribute(format!("kind {} without string value", self.kind)))
    }

    fn require_number(&self) -> TransportResult<i64> {
        self.number_value
            .ok_or_else(|| TransportError::MalformedAttribute(format!("kind {} without number value", self.kind)))
    }
}

/// Contract record of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContract {
    pub contract_name: String,
    pub content_size: u64,
    #[serde(default)]
    pub attributes: Vec<AttributeContract>,
}

/// The whole envelope-contract region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeContract {
    pub envelope_id: String,
    #[serde(default)]
    pub envelope_attributes: Vec<AttributeContract>,
    pub items: Vec<ItemContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_on_utc: Option<DateTime<Utc>>,
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(text: &str) -> TransportResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TransportError::InvalidTimestamp(format!("'{text}': {e}")))
}

/// Converts envelope attributes into discriminated records.
pub fn envelope_attributes_to_contract(attributes: &Attributes) -> TransportResult<Vec<AttributeContract>> {
    attributes
        .iter()
        .map(|(key, value)| match (key.as_str(), value) {
            (keys::CREATED_UTC, AttributeValue::Timestamp(at)) => Ok(AttributeContract::string(
                AttributeKind::CreatedUtc,
                None,
                format_timestamp(at),
            )),
            (keys::SENDER, AttributeValue::Text(sender)) => Ok(AttributeContract::string(
                AttributeKind::Sender,
                None,
                sender.clone(),
            )),
            (keys::CREATED_UTC | keys::SENDER, other) => Err(TransportError::UnsupportedAttributeValue {
                key: key.clone(),
                kind: other.kind(),
            }),
            (_, AttributeValue::Text(text)) => Ok(AttributeContract::string(
                AttributeKind::CustomString,
                Some(key.clone()),
                text.clone(),
            )),
            (_, AttributeValue::Number(n)) => Ok(AttributeContract::number(key.clone(), *n)),
            (_, other @ AttributeValue::Timestamp(_)) => Err(TransportError::UnsupportedAttributeValue {
                key: key.clone(),
                kind: other.kind(),
            }),
        })
        .collect()
}

/// Converts item attributes into records. Items only carry custom kinds.
pub fn item_attributes_to_contract(attributes: &Attributes) -> TransportResult<Vec<AttributeContract>> {
    attributes
        .iter()
        .map(|(key, value)| match value {
            AttributeValue::Text(text) => Ok(AttributeContract::string(
                AttributeKind::CustomString,
                Some(key.clone()),
                text.clone(),
            )),
            AttributeValue::Number(n) => Ok(AttributeContract::number(key.clone(), *n)),
            AttributeValue::Timestamp(_) => Err(TransportError::NotImplemented(format!(
                "serializing {} item attribute '{key}'",
                value.kind()
            ))),
        })
        .collect()
}

/// Rebuilds envelope attributes from their records.
pub fn envelope_attributes_from_contract(records: &[AttributeContract]) -> TransportResult<Attributes> {
    let mut attributes = Attributes::new();
    for record in records {
        match AttributeKind::try_from(record.kind)? {
            AttributeKind::CreatedUtc => {
                let at = parse_timestamp(&record.require_string()?)?;
                attributes.insert(keys::CREATED_UTC.to_string(), AttributeValue::Timestamp(at));
            }
            AttributeKind::Sender => {
                attributes.insert(keys::SENDER.to_string(), AttributeValue::Text(record.require_string()?));
            }
            AttributeKind::CustomString => {
                attributes.insert(record.require_name()?, AttributeValue::Text(record.require_string()?));
            }
            AttributeKind::CustomNumber => {
                attributes.insert(record.require_name()?, AttributeValue::Number(record.require_number()?));
            }
        }
    }
    Ok(attributes)
}

/// Rebuilds item attributes. Reserved kinds are not valid on items.
pub fn item_attributes_from_contract(records: &[AttributeContract]) -> TransportResult<Attributes> {
    let mut attributes = Attributes::new();
    for record in records {
        match AttributeKind::try_from(record.kind)? {
            AttributeKind::CustomString => {
                attributes.insert(record.require_name()?, AttributeValue::Text(record.require_string()?));
            }
            AttributeKind::CustomNumber => {
                attributes.insert(record.require_name()?, AttributeValue::Number(record.require_number()?));
            }
            AttributeKind::CreatedUtc | AttributeKind::Sender => {
                return Err(TransportError::CorruptAttribute(record.kind));
            }
        }
    }
    Ok(attributes)
}
