//! Typed payloads carried inside message items.
//!
//! Payloads are stored as `Box<dyn Payload>` so an envelope can hold
//! heterogeneous message types. Any `'static` type that is `Debug`,
//! `PartialEq`, `Clone` and thread-safe is a payload.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime marker for a payload type.
///
/// Equality and hashing use the `TypeId` only; the name is for display.
#[derive(Debug, Clone, Copy)]
pub struct MappedType {
    id: TypeId,
    name: &'static str,
}

impl MappedType {
    /// Returns the marker for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (`my_app::Ping` -> `Ping`).
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for MappedType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MappedType {}

impl Hash for MappedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for MappedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A message payload held behind a trait object.
pub trait Payload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Marker of the concrete payload type.
    fn mapped_type(&self) -> MappedType;

    fn eq_payload(&self, other: &dyn Payload) -> bool;

    fn clone_payload(&self) -> Box<dyn Payload>;
}

impl<T> Payload for T
where
    T: Any + fmt::Debug + PartialEq + Clone + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn mapped_type(&self) -> MappedType {
        MappedType::of::<T>()
    }

    fn eq_payload(&self, other: &dyn Payload) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }
}

impl PartialEq for dyn Payload {
    fn eq(&self, other: &Self) -> bool {
        self.eq_payload(other)
    }
}

impl<'a> dyn Payload + 'a {
    /// Downcasts to a concrete payload type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[must_use]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
