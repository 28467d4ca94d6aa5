//! Value coercion: raw request text plus a declared type name to a `Value`.
//!
//! The declared type name alone picks the strategy:
//!
//! 1. a primitive kind parses the text with that kind's grammar,
//! 2. the string kind passes the text through untouched,
//! 3. anything else is a reference token resolved against the registry.

use std::str::FromStr;
use std::sync::Arc;

use crate::registry::{ObjectRegistry, RegistryError};
use crate::token::{ReferenceToken, TokenError};
use crate::value::Value;

/// Type names that select the string kind.
pub const STRING_TYPE_NAMES: &[&str] = &["string", "str", "String"];

/// Coercion failure. The two variants map to different response statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoerceError {
    /// The text does not parse for its declared type.
    #[error("invalid {type_name} value {text:?}: {reason}")]
    ValueFormat {
        type_name: String,
        text: Option<String>,
        reason: String,
    },
    /// The reference token is well-formed but names no live object.
    #[error(transparent)]
    NoSuchObject(#[from] RegistryError),
}

impl CoerceError {
    fn format(type_name: &str, text: Option<&str>, reason: impl Into<String>) -> Self {
        Self::ValueFormat {
            type_name: type_name.to_string(),
            text: text.map(ToString::to_string),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PrimitiveKind
// ---------------------------------------------------------------------------

/// Primitive kinds recognised by name, including their long-form aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl PrimitiveKind {
    /// Maps a declared type name to a primitive kind, if it names one.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" | "boolean" => Self::Bool,
            "char" => Self::Char,
            "i8" | "byte" => Self::I8,
            "i16" | "short" => Self::I16,
            "i32" | "int" => Self::I32,
            "i64" | "long" => Self::I64,
            "f32" | "float" => Self::F32,
            "f64" | "double" => Self::F64,
            _ => return None,
        };
        Some(kind)
    }

    /// Parses `text` with this kind's canonical textual grammar.
    ///
    /// # Errors
    ///
    /// Returns a reason string when the text is malformed or out of range.
    pub fn parse(self, text: &str) -> Result<Value, String> {
        fn num<T: FromStr>(text: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            text.parse::<T>().map_err(|e| e.to_string())
        }

        Ok(match self {
            Self::Bool => Value::Bool(num(text)?),
            Self::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err("expected exactly one character".to_string()),
                }
            }
            Self::I8 => Value::I8(num(text)?),
            Self::I16 => Value::I16(num(text)?),
            Self::I32 => Value::I32(num(text)?),
            Self::I64 => Value::I64(num(text)?),
            Self::F32 => Value::F32(num(text)?),
            Self::F64 => Value::F64(num(text)?),
        })
    }
}

/// True when `name` selects the string kind.
#[must_use]
pub fn is_string_type(name: &str) -> bool {
    STRING_TYPE_NAMES.contains(&name)
}

// ---------------------------------------------------------------------------
// ValueCoercer
// ---------------------------------------------------------------------------

/// Converts raw argument text into values, resolving references through the
/// registry it shares with the router.
#[derive(Debug, Clone)]
pub struct ValueCoercer {
    registry: Arc<ObjectRegistry>,
}

impl ValueCoercer {
    #[must_use]
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        Self { registry }
    }

    /// Coerces `raw` for a parameter declared as `declared_type`.
    ///
    /// `raw` is `None` when the request named the parameter without a value.
    ///
    /// # Errors
    ///
    /// `CoerceError::ValueFormat` for malformed text or tokens,
    /// `CoerceError::NoSuchObject` for well-formed tokens with no live entry.
    pub fn coerce(&self, raw: Option<&str>, declared_type: &str) -> Result<Value, CoerceError> {
        if let Some(kind) = PrimitiveKind::from_type_name(declared_type) {
            let text = raw.ok_or_else(|| CoerceError::format(declared_type, raw, "missing value"))?;
            return kind
                .parse(text)
                .map_err(|reason| CoerceError::format(declared_type, raw, reason));
        }
        if is_string_type(declared_type) {
            return Ok(raw.map_or(Value::Null, Value::from));
        }
        self.resolve_reference(raw, declared_type)
    }

    /// Resolves the receiver token for an instance operation on `target_type`.
    ///
    /// # Errors
    ///
    /// Same as [`coerce`](Self::coerce).
    pub fn coerce_receiver(&self, raw: Option<&str>, target_type: &str) -> Result<Value, CoerceError> {
        self.resolve_reference(raw, target_type)
    }

    fn resolve_reference(&self, raw: Option<&str>, declared_type: &str) -> Result<Value, CoerceError> {
        let text = raw.ok_or_else(|| CoerceError::format(declared_type, raw, "missing reference"))?;
        let token = ReferenceToken::from_str(text)
            .map_err(|TokenError { reason, .. }| CoerceError::format(declared_type, raw, reason))?;
        Ok(self.registry.resolve(&token)?)
    }
}
