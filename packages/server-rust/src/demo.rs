//! Built-in demonstration catalog served by `objscope-demo`.
//!
//! `System` exposes static operations covering every value kind the console
//! renders. `Counter` is a small mutable object for exercising receivers,
//! ephemeral links and persistence.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use objscope_core::catalog::{argument, receiver_as};
use objscope_core::{ArrayRef, Inspectable, StaticCatalog, TypeBuilder, Value};

/// Root type of the demo catalog.
pub const SYSTEM: &str = "System";
pub const COUNTER: &str = "Counter";

/// Largest array `System.range` will build.
pub const MAX_RANGE: i32 = 10_000;

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// A thread-safe integer counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI32,
}

impl Counter {
    #[must_use]
    pub fn new(start: i32) -> Self {
        Self {
            value: AtomicI32::new(start),
        }
    }

    pub fn add(&self, delta: i32) -> i32 {
        self.value.fetch_add(delta, Ordering::SeqCst).wrapping_add(delta)
    }

    #[must_use]
    pub fn get(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Counter({})", self.get())
    }
}

impl Inspectable for Counter {
    fn type_name(&self) -> &str {
        COUNTER
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Builds the demo catalog.
#[must_use]
pub fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_type(system_type(Instant::now()))
        .with_type(counter_type())
}

fn int_arg(args: &[Value], index: usize) -> anyhow::Result<i32> {
    argument(args, index)?
        .as_i32()
        .ok_or_else(|| anyhow::anyhow!("argument #{index} is not an int"))
}

fn str_arg(args: &[Value], index: usize) -> anyhow::Result<Option<&str>> {
    let value = argument(args, index)?;
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_str()
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("argument #{index} is not a string"))
}

fn array_arg(args: &[Value], index: usize) -> anyhow::Result<&ArrayRef> {
    argument(args, index)?
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("argument #{index} is not an array"))
}

fn set_element(args: &[Value]) -> anyhow::Result<Value> {
    let array = array_arg(args, 0)?;
    let index = usize::try_from(int_arg(args, 1)?)?;
    let element = argument(args, 2)?.clone();
    if !array.set(index, element) {
        anyhow::bail!("index {index} out of bounds for length {}", array.len());
    }
    Ok(Value::Array(array.clone()))
}

fn system_type(started: Instant) -> TypeBuilder {
    let started = Arc::new(started);
    TypeBuilder::new(SYSTEM)
        .static_op("uptime_millis", &[], "long", move |_| {
            let millis = i64::try_from(started.elapsed().as_millis())?;
            Ok(Value::I64(millis))
        })
        .static_op("thread_name", &[], "string", |_| {
            Ok(thread::current().name().map_or(Value::Null, Value::from))
        })
        .static_op("new_counter", &["int"], COUNTER, |args| {
            Ok(Value::object(Counter::new(int_arg(args, 0)?)))
        })
        .static_op("concat", &["string", "string"], "string", |args| {
            let left = str_arg(args, 0)?.unwrap_or("null");
            let right = str_arg(args, 1)?.unwrap_or("null");
            Ok(Value::from(format!("{left}{right}")))
        })
        .static_op("split", &["string", "string"], "array", |args| {
            let text = str_arg(args, 0)?.unwrap_or_default();
            let separator = str_arg(args, 1)?.unwrap_or_default();
            if separator.is_empty() {
                anyhow::bail!("separator must not be empty");
            }
            Ok(Value::array(text.split(separator).map(Value::from).collect()))
        })
        .static_op("range", &["int"], "array", |args| {
            let n = int_arg(args, 0)?;
            if n > MAX_RANGE {
                anyhow::bail!("range length {n} exceeds {MAX_RANGE}");
            }
            Ok(Value::array((0..n.max(0)).map(Value::I32).collect()))
        })
        .static_op("array_set", &["array", "int", "int"], "array", set_element)
        .static_op("array_set", &["array", "int", "array"], "array", set_element)
        .static_op("array_set", &["array", "int", COUNTER], "array", set_element)
        .static_op("fail", &["string"], "void", |args| {
            let message = str_arg(args, 0)?.unwrap_or("failed");
            Err(anyhow::anyhow!("{message}"))
        })
        .static_op("nothing", &[], "void", |_| Ok(Value::Null))
        .field("version", true, "string", |_| {
            Ok(Value::from(env!("CARGO_PKG_VERSION")))
        })
}

fn counter_type() -> TypeBuilder {
    TypeBuilder::new(COUNTER)
        .instance_op("increment", &[], "int", |this, _| {
            Ok(Value::I32(receiver_as::<Counter>(this)?.add(1)))
        })
        .instance_op("add", &["int"], "int", |this, args| {
            Ok(Value::I32(receiver_as::<Counter>(this)?.add(int_arg(args, 0)?)))
        })
        .instance_op("get", &[], "int", |this, _| {
            Ok(Value::I32(receiver_as::<Counter>(this)?.get()))
        })
        .field("value", false, "int", |this| {
            let this = this.ok_or_else(|| anyhow::anyhow!("instance field read without a receiver"))?;
            Ok(Value::I32(receiver_as::<Counter>(this)?.get()))
        })
}

#[cfg(test)]
mod tests {
    use objscope_core::OperationCatalog;

    use super::*;

    #[test]
    fn counter_arithmetic() {
        let counter = Counter::new(2);
        assert_eq!(counter.add(3), 5);
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.to_string(), "Counter(5)");
    }

    #[test]
    fn catalog_lists_both_types() {
        let catalog = catalog();
        assert_eq!(catalog.type_names(), vec![COUNTER, SYSTEM]);
    }

    #[test]
    fn array_set_overloads_select_by_element_type() {
        let catalog = catalog();
        let system = catalog.lookup_type(SYSTEM).unwrap();
        assert!(system.find_operation("array_set", &["array", "int", "int"]).is_some());
        assert!(system.find_operation("array_set", &["array", "int", "array"]).is_some());
        assert!(system.find_operation("array_set", &["array", "int", "string"]).is_none());
    }

    #[test]
    fn array_set_can_build_a_cycle() {
        let catalog = catalog();
        let op = catalog
            .lookup_type(SYSTEM)
            .unwrap()
            .find_operation("array_set", &["array", "int", "array"])
            .unwrap();
        let array = Value::array(vec![Value::Null]);
        let out = op
            .invoke(None, &[array.clone(), Value::I32(0), array.clone()])
            .unwrap();
        let inner = out.as_array().unwrap().get(0).unwrap();
        assert!(inner.as_array().unwrap().ptr_eq(array.as_array().unwrap()));
    }

    #[test]
    fn counter_ops_mutate_the_receiver() {
        let catalog = catalog();
        let counter_type = catalog.lookup_type(COUNTER).unwrap();
        let this = Value::object(Counter::new(0));
        let add = counter_type.find_operation("add", &["int"]).unwrap();
        add.invoke(Some(&this), &[Value::I32(4)]).unwrap();
        let value = counter_type.find_field("value").unwrap().read(Some(&this)).unwrap();
        assert_eq!(value.as_i32(), Some(4));
    }

    #[test]
    fn fail_raises_its_message() {
        let catalog = catalog();
        let fail = catalog
            .lookup_type(SYSTEM)
            .unwrap()
            .find_operation("fail", &["string"])
            .unwrap();
        let err = fail.invoke(None, &[Value::from("bad <input>")]).unwrap_err();
        assert_eq!(err.to_string(), "bad <input>");
    }
}
