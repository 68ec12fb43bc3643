//! Collaborator traits for contract-name mapping and payload serialization.
//!
//! A contract name is the stable, process-independent identifier of a
//! payload type. Mappings must be bidirectional and must survive restarts,
//! otherwise persisted envelopes and views stop being decodable.

use crate::payload::{MappedType, Payload};
use crate::Result;
use std::io::Write;

/// Bidirectional mapping between payload types and contract names.
pub trait ContractMapper: Send + Sync {
    fn contract_name_by_type(&self, ty: MappedType) -> Option<String>;

    fn type_by_contract_name(&self, name: &str) -> Option<MappedType>;
}

/// Per-type object serializer used for item contents.
pub trait MessageSerializer: ContractMapper {
    /// Writes the encoded payload to `out`.
    fn serialize(&self, payload: &dyn Payload, out: &mut dyn Write) -> Result<()>;

    /// Decodes `bytes` as an instance of `ty`.
    fn deserialize(&self, bytes: &[u8], ty: MappedType) -> Result<Box<dyn Payload>>;
}
