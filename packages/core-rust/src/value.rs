//! Runtime value model for the console.
//!
//! A [`Value`] is anything an operation can accept or return: a primitive, a
//! string, a shared array, or a live object. Arrays and objects are held by
//! `Arc`, so cloning a `Value` never copies the underlying data and values
//! handed out by the registry stay valid after their entry is swept.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Type-erased access to the concrete type behind a `dyn Inspectable`.
///
/// Implemented for every `'static` type, so implementors of [`Inspectable`]
/// never write it by hand.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A live object that can be exposed through the operation catalog.
///
/// The `Display` output is the object's default textual form, which the
/// renderer escapes before embedding it in a page.
pub trait Inspectable: Any + AsAny + Send + Sync + fmt::Debug + fmt::Display {
    /// Catalog type name of this object (e.g. `"Counter"`).
    fn type_name(&self) -> &str;
}

/// Runtime type names of the non-object values an operation can return.
///
/// These have no catalog entry but still get a members page.
pub const BUILTIN_TYPE_NAMES: [&str; 10] = [
    "bool", "char", "i8", "i16", "i32", "i64", "f32", "f64", "string", "array",
];

/// Generic runtime value passed to and returned from operations.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value. Never registered.
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// UTF-8 text.
    Str(String),
    /// Shared, mutable sequence of values.
    Array(ArrayRef),
    /// Live object implementing [`Inspectable`].
    Object(Arc<dyn Inspectable>),
}

impl Value {
    /// Wraps a concrete object in a `Value::Object`.
    pub fn object<T: Inspectable>(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    /// Builds a new shared array from the given elements.
    #[must_use]
    pub fn array(elements: Vec<Value>) -> Self {
        Self::Array(ArrayRef::new(elements))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type name, used to build type-scoped browsing links.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object(object) => object.type_name(),
        }
    }

    /// Returns the concrete object if this value is an object of type `T`.
    #[must_use]
    pub fn downcast_ref<T: Inspectable>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => {
                let inner: &dyn Inspectable = object.as_ref();
                inner.as_any().downcast_ref::<T>()
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widens any integer variant to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I8(v) => Some(i64::from(*v)),
            Self::I16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Shared handle to a mutable array.
///
/// Arrays have reference semantics: every clone of an `ArrayRef` observes the
/// same elements, which also means an array can end up containing itself.
#[derive(Clone)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    #[must_use]
    pub fn new(elements: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(elements)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Replaces the element at `index`. Returns `false` when out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Copies the current elements out from under the lock.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Identity of the underlying storage, shared by all clones.
    #[must_use]
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// Elements are not printed: an array may contain itself.
impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Gauge(u32);

    impl fmt::Display for Gauge {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Gauge#{}", self.0)
        }
    }

    impl Inspectable for Gauge {
        fn type_name(&self) -> &str {
            "Gauge"
        }
    }

    #[derive(Debug)]
    struct Other;

    impl fmt::Display for Other {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Other")
        }
    }

    impl Inspectable for Other {
        fn type_name(&self) -> &str {
            "Other"
        }
    }

    #[test]
    fn non_object_type_names_are_builtin() {
        let values = [
            Value::Bool(true),
            Value::Char('x'),
            Value::I8(1),
            Value::I16(1),
            Value::I32(1),
            Value::I64(1),
            Value::F32(1.0),
            Value::F64(1.0),
            Value::from("s"),
            Value::array(Vec::new()),
        ];
        for value in &values {
            assert!(BUILTIN_TYPE_NAMES.contains(&value.type_name()));
        }
        assert!(!BUILTIN_TYPE_NAMES.contains(&Value::object(Gauge(1)).type_name()));
    }

    #[test]
    fn downcast_to_concrete_object() {
        let value = Value::object(Gauge(7));
        assert_eq!(value.downcast_ref::<Gauge>().map(|p| p.0), Some(7));
        assert!(value.downcast_ref::<Other>().is_none());
        assert!(Value::I32(7).downcast_ref::<Gauge>().is_none());
    }

    #[test]
    fn type_names_for_each_variant() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::I32(1).type_name(), "i32");
        assert_eq!(Value::from("x").type_name(), "string");
        assert_eq!(Value::array(vec![]).type_name(), "array");
        assert_eq!(Value::object(Gauge(1)).type_name(), "Gauge");
    }

    #[test]
    fn integer_accessors_widen_and_narrow() {
        assert_eq!(Value::I8(-3).as_i64(), Some(-3));
        assert_eq!(Value::I64(i64::MAX).as_i32(), None);
        assert_eq!(Value::I16(12).as_i32(), Some(12));
        assert_eq!(Value::from("12").as_i32(), None);
    }

    #[test]
    fn option_none_converts_to_null() {
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::from(Some(5)).as_i32(), Some(5));
    }

    #[test]
    fn array_clones_share_storage() {
        let a = ArrayRef::new(vec![Value::I32(1), Value::I32(2)]);
        let b = a.clone();
        assert!(b.set(1, Value::I32(20)));
        assert_eq!(a.get(1).and_then(|v| v.as_i32()), Some(20));
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());
        assert!(!a.set(5, Value::Null));
    }

    #[test]
    fn self_containing_array_debug_terminates() {
        let a = ArrayRef::new(vec![Value::Null]);
        a.set(0, Value::Array(a.clone()));
        let printed = format!("{:?}", Value::Array(a));
        assert!(printed.contains("len: 1"));
    }
}
