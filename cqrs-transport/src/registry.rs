//! JSON-backed payload serializer with an explicit contract registry.
//!
//! Every payload type is registered once under a stable contract name.
//! The registry answers both directions of the mapping and encodes item
//! contents as JSON with `serde_json`.

use cqrs_types::{ContractMapper, Error, MappedType, MessageSerializer, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

type SerializeFn = fn(&dyn Payload, &mut dyn Write) -> cqrs_types::Result<()>;
type DeserializeFn = fn(&[u8]) -> cqrs_types::Result<Box<dyn Payload>>;

#[derive(Clone)]
struct Registration {
    contract_name: String,
    ty: MappedType,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

fn serialize_json<T: Payload + Serialize>(payload: &dyn Payload, out: &mut dyn Write) -> cqrs_types::Result<()> {
    let value = payload.downcast_ref::<T>().ok_or_else(|| Error::PayloadMismatch {
        expected: std::any::type_name::<T>().to_string(),
    })?;
    serde_json::to_writer(out, value)?;
    Ok(())
}

fn deserialize_json<T: Payload + DeserializeOwned>(bytes: &[u8]) -> cqrs_types::Result<Box<dyn Payload>> {
    let value: T = serde_json::from_slice(bytes)?;
    Ok(Box::new(value))
}

/// Contract registry and JSON payload serializer.
#[derive(Clone, Default)]
pub struct JsonMessageSerializer {
    by_type: HashMap<MappedType, Registration>,
    by_name: HashMap<String, MappedType>,
}

impl JsonMessageSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under `contract_name`.
    ///
    /// Re-registering a type or a name replaces the previous mapping.
    pub fn register<T>(&mut self, contract_name: impl Into<String>) -> &mut Self
    where
        T: Payload + Serialize + DeserializeOwned,
    {
        let contract_name = contract_name.into();
        let ty = MappedType::of::<T>();

        if let Some(previous) = self.by_type.remove(&ty) {
            self.by_name.remove(&previous.contract_name);
        }
        if let Some(previous) = self.by_name.remove(&contract_name) {
            self.by_type.remove(&previous);
        }

        debug!("Registered contract {} for {}", contract_name, ty);
        self.by_name.insert(contract_name.clone(), ty);
        self.by_type.insert(
            ty,
            Registration {
                contract_name,
                ty,
                serialize: serialize_json::<T>,
                deserialize: deserialize_json::<T>,
            },
        );
        self
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with<T>(mut self, contract_name: impl Into<String>) -> Self
    where
        T: Payload + Serialize + DeserializeOwned,
    {
        self.register::<T>(contract_name);
        self
    }

    /// Number of registered contracts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    fn registration(&self, ty: MappedType) -> cqrs_types::Result<&Registration> {
        self.by_type
            .get(&ty)
            .ok_or_else(|| Error::UnknownType(ty.name().to_string()))
    }
}

impl std::fmt::Debug for JsonMessageSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("JsonMessageSerializer")
            .field("contracts", &names)
            .finish()
    }
}

impl ContractMapper for JsonMessageSerializer {
    fn contract_name_by_type(&self, ty: MappedType) -> Option<String> {
        self.by_type.get(&ty).map(|r| r.contract_name.clone())
    }

    fn type_by_contract_name(&self, name: &str) -> Option<MappedType> {
        self.by_name.get(name).copied()
    }
}

impl MessageSerializer for JsonMessageSerializer {
    fn serialize(&self, payload: &dyn Payload, out: &mut dyn Write) -> cqrs_types::Result<()> {
        let registration = self.registration(payload.mapped_type())?;
        (registration.serialize)(payload, out)
    }

    fn deserialize(&self, bytes: &[u8], ty: MappedType) -> cqrs_types::Result<Box<dyn Payload>> {
        let registration = self.registration(ty)?;
        debug_assert_eq!(registration.ty, ty);
        (registration.deserialize)(bytes)
    }
}
