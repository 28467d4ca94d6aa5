//! `objscope` core: value model, operation catalog, object registry, coercion,
//! request grammar, and HTML-safe rendering.

pub mod catalog;
pub mod clock;
pub mod coerce;
pub mod registry;
pub mod render;
pub mod request;
pub mod token;
pub mod value;

pub use catalog::{
    FieldDescriptor, FieldEntry, OperationCatalog, OperationDescriptor, OperationEntry,
    StaticCatalog, TypeBuilder, TypeEntry,
};
pub use clock::{ClockSource, MonotonicClock};
pub use coerce::{CoerceError, PrimitiveKind, ValueCoercer};
pub use registry::{ObjectRegistry, RegistryError, EPHEMERAL_TTL};
pub use request::{InvocationRequest, Parameter, RequestFormatError};
pub use token::{ReferenceToken, TokenError};
pub use value::{ArrayRef, Inspectable, Value, BUILTIN_TYPE_NAMES};

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }

    proptest! {
        // A `[uuid]` token never resolves through the persistent map and a
        // `$name` token never resolves through the ephemeral map.
        #[test]
        fn tokens_resolve_only_in_their_own_namespace(name in "[a-z0-9-]{1,40}") {
            let registry = ObjectRegistry::new();
            let id = registry.add(Value::I32(1));
            let other = Uuid::new_v4();

            // Persistent names that spell out uuids, with and without brackets.
            registry.promote(&id, format!("[{other}]")).unwrap();
            registry.promote(&id, other.to_string()).unwrap();
            registry.promote(&id, name.clone()).unwrap();

            let bracketed: ReferenceToken = format!("[{other}]").parse().unwrap();
            prop_assert!(registry.resolve(&bracketed).is_err());

            // An ephemeral id spelled as a persistent name only hits if promoted.
            let as_name: ReferenceToken = format!("${id}").parse().unwrap();
            prop_assert!(registry.resolve(&as_name).is_err());

            let named: ReferenceToken = format!("${name}").parse().unwrap();
            prop_assert!(registry.resolve(&named).is_ok());
        }
    }
}
