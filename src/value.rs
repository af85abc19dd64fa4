//! The loosely-typed value tree flowing through the decoding pipeline.
//!
//! Every raw input, intermediate resolver output and decoded field value is a [`Value`].
//! The runtime type identifier of a value ([`Value::runtime_type`]) is what the type
//! checker compares against a field's declared type.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::constructor::DynamicObject;
use crate::error::{ConversionError, DecodeError};

pub const DYNAMIC: &str = "dynamic";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    List(Sequence),
    /// Unordered collection. Items are kept unique in insertion order.
    Set(Sequence),
    Map(IndexMap<String, Value>),
    /// An already constructed value of some decodable type.
    Instance(Instance),
}

/// Items of a list or set, optionally tagged with the type every item was decoded into.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence {
    pub element: Option<String>,
    pub items: Vec<Value>,
}

#[derive(Clone)]
pub struct Instance {
    type_id: String,
    inner: Arc<dyn Any + Send + Sync>,
}

// ————————————————————————————————————————————————————————————————————————————
// VALUE
// ————————————————————————————————————————————————————————————————————————————

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Sequence { element: None, items })
    }

    pub fn typed_list(element: impl Into<String>, items: Vec<Value>) -> Self {
        Value::List(Sequence { element: Some(element.into()), items })
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Sequence::unique(None, items))
    }

    pub fn typed_set(element: impl Into<String>, items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Sequence::unique(Some(element.into()), items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Maps, lists and sets. These are the values nested strategies get a chance to decode.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Map(_) | Value::List(_) | Value::Set(_))
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Type identifier as the type checker sees it.
    pub fn runtime_type(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Text(_) => "String".to_string(),
            Value::DateTime(_) => "DateTime".to_string(),
            Value::List(seq) => format!("List<{}>", seq.element_type()),
            Value::Set(seq) => format!("Set<{}>", seq.element_type()),
            Value::Map(_) => format!("Map<String, {DYNAMIC}>"),
            Value::Instance(instance) => instance.type_id.clone(),
        }
    }

    /// Render back into JSON. Only [`DynamicObject`] instances can be rendered; other
    /// instances are opaque Rust values.
    pub fn to_json(&self) -> Result<serde_json::Value, DecodeError> {
        use serde_json::Value as Json;
        Ok(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Double(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| DecodeError::Strategy(format!("cannot render {f} as JSON")))?,
            Value::Text(s) => Json::String(s.clone()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::List(seq) | Value::Set(seq) => Json::Array(
                seq.items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => Json::Object(map_to_json(map)?),
            Value::Instance(instance) => match instance.downcast_ref::<DynamicObject>() {
                Some(object) => Json::Object(map_to_json(object.fields())?),
                None => {
                    return Err(DecodeError::Strategy(format!(
                        "instance of '{}' has no JSON representation",
                        instance.type_id
                    )));
                }
            },
        })
    }
}

fn map_to_json(
    map: &IndexMap<String, Value>,
) -> Result<serde_json::Map<String, serde_json::Value>, DecodeError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
        .collect()
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 beyond i64 and floats both land here
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Text(s),
            Json::Array(xs) => Value::list(xs.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        Value::from(json.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SEQUENCE
// ————————————————————————————————————————————————————————————————————————————

impl Sequence {
    fn unique(element: Option<String>, items: impl IntoIterator<Item = Value>) -> Self {
        let mut out = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self { element, items: out }
    }

    fn element_type(&self) -> &str {
        self.element.as_deref().unwrap_or(DYNAMIC)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE
// ————————————————————————————————————————————————————————————————————————————

impl Instance {
    pub fn new<T: Any + Send + Sync>(type_id: impl Into<String>, value: T) -> Self {
        Self { type_id: type_id.into(), inner: Arc::new(value) }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take the wrapped value out, cloning only when the instance is shared.
    pub fn downcast<T: Any + Send + Sync + Clone>(self) -> Result<T, ConversionError> {
        let type_id = self.type_id;
        match self.inner.downcast::<T>() {
            Ok(arc) => Ok(Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())),
            Err(_) => Err(ConversionError::new(std::any::type_name::<T>(), type_id)),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.downcast_ref::<DynamicObject>() {
            Some(object) => f.debug_tuple("Instance").field(object).finish(),
            None => write!(f, "Instance<{}>", self.type_id),
        }
    }
}
