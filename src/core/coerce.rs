//! core::coerce
//!
//! Converts raw text plus a declared type name into a typed value.
//!
//! # Registry
//!
//! Type names live in a [`TypeRegistry`]. The default registry knows the
//! builtin names `string`, `integer`, `float`, `boolean` and `list`;
//! embedding applications may register more. The registry is enumerable
//! so a CLI can present the valid choices.
//!
//! # Builtin rules
//!
//! | type      | accepted input                                             |
//! |-----------|------------------------------------------------------------|
//! | `string`  | anything, unchanged                                        |
//! | `integer` | optional sign and decimal digits (surrounding space trimmed) |
//! | `float`   | anything `f64` parses, excluding NaN and infinities        |
//! | `boolean` | `true/false`, `yes/no`, `on/off`, `1/0`, case-insensitive  |
//! | `list`    | comma-separated items, each trimmed; empty input is `[]`   |
//!
//! # Example
//!
//! ```
//! use confkit::core::coerce::{TypeRegistry, TypedValue};
//!
//! let registry = TypeRegistry::default();
//! assert_eq!(registry.coerce("5433", "integer").unwrap(), TypedValue::Integer(5433));
//! assert!(registry.coerce("abc", "integer").is_err());
//! assert!(registry.coerce("1", "uuid").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_yaml::Value;
use thiserror::Error;

/// Name of the default type.
pub const DEFAULT_TYPE: &str = "string";

/// Names of the builtin types, in presentation order.
pub const BUILTIN_TYPES: [&str; 5] = ["string", "integer", "float", "boolean", "list"];

/// Errors from value coercion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoerceError {
    /// The requested type name is not registered.
    #[error("unsupported type '{type_name}', must be one of: {}", .supported.join(", "))]
    UnsupportedTypeKind {
        type_name: String,
        supported: Vec<String>,
    },

    /// The raw text cannot be converted to the requested type.
    #[error("cannot convert '{raw}' to {target}: {reason}")]
    ValueCoercion {
        raw: String,
        target: String,
        reason: String,
    },
}

/// A value produced by coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<String>),
    /// Arbitrary structured node, produced by registered custom types.
    Node(Value),
}

impl TypedValue {
    /// Convert into a document node.
    pub fn into_node(self) -> Value {
        match self {
            TypedValue::String(s) => Value::String(s),
            TypedValue::Integer(i) => Value::from(i),
            TypedValue::Float(f) => Value::from(f),
            TypedValue::Boolean(b) => Value::Bool(b),
            TypedValue::List(items) => {
                Value::Sequence(items.into_iter().map(Value::String).collect())
            }
            TypedValue::Node(node) => node,
        }
    }
}

impl From<TypedValue> for Value {
    fn from(value: TypedValue) -> Self {
        value.into_node()
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) => write!(f, "{}", s),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::List(items) => write!(f, "[{}]", items.join(", ")),
            TypedValue::Node(node) => write!(f, "{:?}", node),
        }
    }
}

/// A coercion function: raw text in, typed value or failure reason out.
pub type Coercer = Arc<dyn Fn(&str) -> Result<TypedValue, String> + Send + Sync>;

/// Named registry of coercions. Clones share the coercion functions.
#[derive(Clone)]
pub struct TypeRegistry {
    coercers: BTreeMap<String, Coercer>,
    order: Vec<String>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.order)
            .finish()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("string", |raw| Ok(TypedValue::String(raw.to_string())));
        registry.register("integer", coerce_integer);
        registry.register("float", coerce_float);
        registry.register("boolean", coerce_boolean);
        registry.register("list", |raw| Ok(TypedValue::List(split_list(raw))));
        registry
    }
}

impl TypeRegistry {
    /// A registry with no types at all.
    pub fn empty() -> Self {
        Self {
            coercers: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Register (or replace) a named type.
    pub fn register<F>(&mut self, name: impl Into<String>, coercer: F)
    where
        F: Fn(&str) -> Result<TypedValue, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if !self.coercers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.coercers.insert(name, Arc::new(coercer));
    }

    /// Registered type names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Check whether a type name is registered.
    pub fn supports(&self, type_name: &str) -> bool {
        self.coercers.contains_key(type_name)
    }

    /// Convert `raw` according to `type_name`.
    ///
    /// # Errors
    ///
    /// - [`CoerceError::UnsupportedTypeKind`] if `type_name` is not registered
    /// - [`CoerceError::ValueCoercion`] if `raw` does not fit the type
    pub fn coerce(&self, raw: &str, type_name: &str) -> Result<TypedValue, CoerceError> {
        let coercer =
            self.coercers
                .get(type_name)
                .ok_or_else(|| CoerceError::UnsupportedTypeKind {
                    type_name: type_name.to_string(),
                    supported: self.order.clone(),
                })?;

        coercer(raw).map_err(|reason| CoerceError::ValueCoercion {
            raw: raw.to_string(),
            target: type_name.to_string(),
            reason,
        })
    }
}

/// Coerce with the default registry.
pub fn coerce(raw: &str, type_name: &str) -> Result<TypedValue, CoerceError> {
    TypeRegistry::default().coerce(raw, type_name)
}

fn coerce_integer(raw: &str) -> Result<TypedValue, String> {
    raw.trim()
        .parse::<i64>()
        .map(TypedValue::Integer)
        .map_err(|e| e.to_string())
}

fn coerce_float(raw: &str) -> Result<TypedValue, String> {
    let value = raw.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !value.is_finite() {
        return Err("value must be finite".to_string());
    }
    Ok(TypedValue::Float(value))
}

fn coerce_boolean(raw: &str) -> Result<TypedValue, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(TypedValue::Boolean(true)),
        "false" | "no" | "off" | "0" => Ok(TypedValue::Boolean(false)),
        _ => Err("expected one of true/false, yes/no, on/off, 1/0".to_string()),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|item| item.trim().to_string()).collect()
}
