//! Closed polymorphic value type for configuration entries
//!
//! Mod-internal access is fully typed through the [`ConfigKind`] trait;
//! external callers enumerating another mod's keys inspect the same data
//! through [`ConfigValue`] without knowing the concrete Rust type.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime tag for the kind of value a key holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    List,
    Table,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Table => "table",
        };
        write!(f, "{}", name)
    }
}

/// A configuration value of one of the supported kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Table(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Get the kind tag for this value
    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Table(_) => ValueKind::Table,
        }
    }

    /// Convert to the JSON representation used in persisted documents
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Int(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Value::from(*f),
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Table(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert from a persisted JSON value
    ///
    /// Returns `None` for JSON null or any nested null, since no [`ValueKind`]
    /// represents an absent value.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ConfigValue::Int(i))
                } else {
                    n.as_f64().map(ConfigValue::Float)
                }
            }
            serde_json::Value::String(s) => Some(ConfigValue::String(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(ConfigValue::from_json)
                .collect::<Option<Vec<_>>>()
                .map(ConfigValue::List),
            serde_json::Value::Object(entries) => entries
                .iter()
                .map(|(k, v)| ConfigValue::from_json(v).map(|v| (k.clone(), v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(ConfigValue::Table),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Bridge between a concrete Rust type and its [`ConfigValue`] representation
///
/// Implemented for the closed set of supported kinds. Keys are declared at a
/// `ConfigKind` type and stay fully typed inside the owning mod.
pub trait ConfigKind: Clone + Send + Sync + 'static {
    /// The kind tag values of this type carry
    const KIND: ValueKind;

    fn into_value(self) -> ConfigValue;

    /// Recover the typed value; `None` on a kind mismatch
    fn from_value(value: &ConfigValue) -> Option<Self>;
}

impl ConfigKind for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> ConfigValue {
        ConfigValue::Bool(self)
    }

    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl ConfigKind for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> ConfigValue {
        ConfigValue::Int(self)
    }

    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl ConfigKind for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn into_value(self) -> ConfigValue {
        ConfigValue::Float(self)
    }

    // Persisted whole numbers round-trip through JSON as integers, so a
    // float key accepts Int by lossless widening.
    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl ConfigKind for String {
    const KIND: ValueKind = ValueKind::String;

    fn into_value(self) -> ConfigValue {
        ConfigValue::String(self)
    }

    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl ConfigKind for Vec<ConfigValue> {
    const KIND: ValueKind = ValueKind::List;

    fn into_value(self) -> ConfigValue {
        ConfigValue::List(self)
    }

    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl ConfigKind for BTreeMap<String, ConfigValue> {
    const KIND: ValueKind = ValueKind::Table;

    fn into_value(self) -> ConfigValue {
        ConfigValue::Table(self)
    }

    fn from_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Table(entries) => Some(entries.clone()),
            _ => None,
        }
    }
}
