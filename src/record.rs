//! The construction record handed to a target type's constructor, and typed extraction
//! out of it.
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::constructor::Decodable;
use crate::error::{ConversionError, DecodeError};
use crate::value::Value;

/// Resolved field values in schema order. Non-required fields that resolved to null are
/// absent; required nullable ones are present as [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionRecord {
    type_id: String,
    fields: IndexMap<String, Value>,
}

impl ConstructionRecord {
    pub(crate) fn new(type_id: impl Into<String>) -> Self {
        Self { type_id: type_id.into(), fields: IndexMap::new() }
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Remove a field and convert it. An absent field converts from null, so `Option<T>`
    /// yields `None` and anything else fails.
    pub fn take<T: FromValue>(&mut self, field: &str) -> Result<T, DecodeError> {
        let value = self.fields.shift_remove(field).unwrap_or(Value::Null);
        self.convert(field, value)
    }

    /// Like [`take`](Self::take), but an omitted field falls back to `default`.
    pub fn take_or<T: FromValue>(&mut self, field: &str, default: T) -> Result<T, DecodeError> {
        match self.fields.shift_remove(field) {
            Some(value) => self.convert(field, value),
            None => Ok(default),
        }
    }

    pub fn take_or_default<T: FromValue + Default>(
        &mut self,
        field: &str,
    ) -> Result<T, DecodeError> {
        self.take_or(field, T::default())
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }

    fn convert<T: FromValue>(&self, field: &str, value: Value) -> Result<T, DecodeError> {
        T::from_value(value).map_err(|source| DecodeError::Construct {
            type_id: self.type_id.clone(),
            field: field.to_string(),
            source,
        })
    }
}

// ------------------------------- FromValue -------------------------------- //

/// Conversion from a resolved [`Value`] into a constructor argument.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T, ConversionError> {
    Err(ConversionError::new(expected, value.runtime_type()))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(i),
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => {
                i32::try_from(i).map_err(|_| ConversionError::new("i32", i.to_string()))
            }
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => {
                u32::try_from(i).map_err(|_| ConversionError::new("u32", i.to_string()))
            }
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Double(f) => Ok(f),
            other => mismatch("double", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => mismatch("String", &other),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => mismatch("DateTime", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(seq) | Value::Set(seq) => {
                seq.items.into_iter().map(T::from_value).collect()
            }
            other => mismatch("List", &other),
        }
    }
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Set(seq) | Value::List(seq) => {
                seq.items.into_iter().map(T::from_value).collect()
            }
            other => mismatch("Set", &other),
        }
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Set(seq) | Value::List(seq) => {
                seq.items.into_iter().map(T::from_value).collect()
            }
            other => mismatch("Set", &other),
        }
    }
}

impl<T: FromValue> FromValue for IndexMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => mismatch("Map", &other),
        }
    }
}

impl<T: Decodable> FromValue for T {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Instance(instance) => instance.downcast::<T>(),
            other => mismatch(std::any::type_name::<T>(), &other),
        }
    }
}
