//! Naming strategies for the atomic entity store.

use cqrs_types::MappedType;

/// Maps an entity type and key to a blob location.
///
/// Implementations must be pure and deterministic, and distinct
/// `(type, key)` pairs must map to distinct locations.
pub trait NamingStrategy: Send + Sync {
    /// Container (folder) holding all entities of `ty`.
    fn folder_for(&self, ty: MappedType) -> String;

    /// Blob name of the entity with `key` inside its folder.
    fn name_for(&self, ty: MappedType, key: &str) -> String;
}

/// Folder is the full type path, blob is `{key}.json`.
///
/// `::` becomes `.`; any other character outside `[A-Za-z0-9_]` is written
/// as `~` plus its UTF-8 bytes in hex. `billing::Account` and
/// `crm::Account` therefore get the folders `billing.Account` and
/// `crm.Account`, and `Page<a::Row>` becomes `Page~3ca.Row~3e`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

fn escape_type_path(path: &str) -> String {
    let mut folder = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("::") {
            folder.push('.');
            rest = tail;
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            folder.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                folder.push_str(&format!("~{byte:02x}"));
            }
        }
        rest = &rest[c.len_utf8()..];
    }
    folder
}

impl NamingStrategy for DefaultNamingStrategy {
    fn folder_for(&self, ty: MappedType) -> String {
        escape_type_path(ty.name())
    }

    fn name_for(&self, _ty: MappedType, key: &str) -> String {
        format!("{key}.json")
    }
}
