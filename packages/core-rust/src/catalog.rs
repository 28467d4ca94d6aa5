//! Operation catalog: which operations and fields each exposed type offers.
//!
//! The router never introspects values. It asks an [`OperationCatalog`] for a
//! [`TypeEntry`] by name and matches operations by name plus the exact list of
//! declared parameter type names, which is what lets overloads coexist.
//! [`StaticCatalog`] is the table implementation, built once at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{Inspectable, Value};

/// Implementation of an operation: `(receiver, arguments) -> result`.
///
/// Static operations receive `None` as the receiver. An `Err` is the
/// operation's own failure and is reported to the caller as data.
pub type OperationFn =
    Arc<dyn Fn(Option<&Value>, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Implementation of a field read: `receiver -> value`.
pub type FieldFn = Arc<dyn Fn(Option<&Value>) -> anyhow::Result<Value> + Send + Sync>;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Formal signature of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub declaring_type: String,
    pub name: String,
    pub is_static: bool,
    pub parameter_types: Vec<String>,
    pub return_type: String,
}

/// Renders as `[static ]<return> <Type>.<name>(<p1>, <p2>)`.
impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(
            f,
            "{} {}.{}({})",
            self.return_type,
            self.declaring_type,
            self.name,
            self.parameter_types.join(", ")
        )
    }
}

/// Formal signature of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub declaring_type: String,
    pub name: String,
    pub is_static: bool,
    pub type_name: String,
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            f.write_str("static ")?;
        }
        write!(f, "{} {}.{}", self.type_name, self.declaring_type, self.name)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A callable operation: descriptor plus implementation.
#[derive(Clone)]
pub struct OperationEntry {
    descriptor: OperationDescriptor,
    invoke: OperationFn,
}

impl OperationEntry {
    #[must_use]
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Runs the operation on the current thread.
    ///
    /// # Errors
    ///
    /// Returns whatever failure the operation itself raises.
    pub fn invoke(&self, receiver: Option<&Value>, arguments: &[Value]) -> anyhow::Result<Value> {
        (self.invoke)(receiver, arguments)
    }

    fn matches(&self, name: &str, parameter_types: &[&str]) -> bool {
        self.descriptor.name == name
            && self.descriptor.parameter_types.len() == parameter_types.len()
            && self
                .descriptor
                .parameter_types
                .iter()
                .zip(parameter_types)
                .all(|(declared, requested)| declared == requested)
    }
}

impl fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationEntry")
            .field(&self.descriptor)
            .finish()
    }
}

/// A readable field: descriptor plus accessor.
#[derive(Clone)]
pub struct FieldEntry {
    descriptor: FieldDescriptor,
    read: FieldFn,
}

impl FieldEntry {
    #[must_use]
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Reads the field on the current thread.
    ///
    /// # Errors
    ///
    /// Returns whatever failure the accessor raises.
    pub fn read(&self, receiver: Option<&Value>) -> anyhow::Result<Value> {
        (self.read)(receiver)
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldEntry").field(&self.descriptor).finish()
    }
}

/// Everything the catalog knows about one exposed type.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    name: String,
    operations: Vec<OperationEntry>,
    fields: Vec<FieldEntry>,
}

impl TypeEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationEntry] {
        &self.operations
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Finds the operation with this name and exactly these parameter types.
    #[must_use]
    pub fn find_operation(&self, name: &str, parameter_types: &[&str]) -> Option<&OperationEntry> {
        self.operations
            .iter()
            .find(|op| op.matches(name, parameter_types))
    }

    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.descriptor.name == name)
    }
}

// ---------------------------------------------------------------------------
// OperationCatalog
// ---------------------------------------------------------------------------

/// Lookup interface the router depends on.
pub trait OperationCatalog: Send + Sync {
    /// Returns the entry for `type_name`, if the type is exposed.
    fn lookup_type(&self, type_name: &str) -> Option<&TypeEntry>;

    /// Names of all exposed types, sorted.
    fn type_names(&self) -> Vec<&str>;
}

/// Catalog backed by a table built once at startup.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    types: HashMap<String, TypeEntry>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type. A later registration under the same name replaces the
    /// earlier one.
    #[must_use]
    pub fn with_type(mut self, builder: TypeBuilder) -> Self {
        self.register(builder);
        self
    }

    pub fn register(&mut self, builder: TypeBuilder) {
        let entry = builder.build();
        if self.types.contains_key(&entry.name) {
            tracing::warn!(type_name = %entry.name, "replacing catalog entry");
        }
        self.types.insert(entry.name.clone(), entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl OperationCatalog for StaticCatalog {
    fn lookup_type(&self, type_name: &str) -> Option<&TypeEntry> {
        self.types.get(type_name)
    }

    fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// TypeBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for one [`TypeEntry`].
pub struct TypeBuilder {
    name: String,
    operations: Vec<OperationEntry>,
    fields: Vec<FieldEntry>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Adds an operation with an explicit static/instance flag.
    #[must_use]
    pub fn operation<F>(
        mut self,
        name: &str,
        is_static: bool,
        parameter_types: &[&str],
        return_type: &str,
        invoke: F,
    ) -> Self
    where
        F: Fn(Option<&Value>, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.operations.push(OperationEntry {
            descriptor: OperationDescriptor {
                declaring_type: self.name.clone(),
                name: name.to_string(),
                is_static,
                parameter_types: parameter_types.iter().map(ToString::to_string).collect(),
                return_type: return_type.to_string(),
            },
            invoke: Arc::new(invoke),
        });
        self
    }

    #[must_use]
    pub fn static_op<F>(self, name: &str, parameter_types: &[&str], return_type: &str, invoke: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.operation(name, true, parameter_types, return_type, move |_, args| {
            invoke(args)
        })
    }

    #[must_use]
    pub fn instance_op<F>(
        self,
        name: &str,
        parameter_types: &[&str],
        return_type: &str,
        invoke: F,
    ) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.operation(name, false, parameter_types, return_type, move |this, args| {
            let this = this.ok_or_else(|| anyhow::anyhow!("instance operation called without a receiver"))?;
            invoke(this, args)
        })
    }

    #[must_use]
    pub fn field<F>(mut self, name: &str, is_static: bool, type_name: &str, read: F) -> Self
    where
        F: Fn(Option<&Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.fields.push(FieldEntry {
            descriptor: FieldDescriptor {
                declaring_type: self.name.clone(),
                name: name.to_string(),
                is_static,
                type_name: type_name.to_string(),
            },
            read: Arc::new(read),
        });
        self
    }

    #[must_use]
    pub fn build(self) -> TypeEntry {
        TypeEntry {
            name: self.name,
            operations: self.operations,
            fields: self.fields,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers for operation implementations
// ---------------------------------------------------------------------------

/// Downcasts a receiver to the concrete object type `T`.
///
/// # Errors
///
/// Fails when the receiver is not an object of type `T`.
pub fn receiver_as<T: Inspectable>(this: &Value) -> anyhow::Result<&T> {
    this.downcast_ref::<T>().ok_or_else(|| {
        anyhow::anyhow!(
            "receiver of type {} is not a {}",
            this.type_name(),
            std::any::type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or_default()
        )
    })
}

/// Fetches argument `index`, failing with a descriptive error when missing.
///
/// # Errors
///
/// Fails when fewer than `index + 1` arguments were supplied.
pub fn argument(args: &[Value], index: usize) -> anyhow::Result<&Value> {
    args.get(index)
        .ok_or_else(|| anyhow::anyhow!("missing argument #{index}"))
}
