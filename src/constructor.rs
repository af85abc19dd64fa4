//! Constructor handles: how the engine learns a target type's schema and how it builds the
//! target from a finished [`ConstructionRecord`].
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ConversionError, DecodeError};
use crate::record::{ConstructionRecord, FromValue};
use crate::signature::Schema;
use crate::value::{Instance, Value};

/// A Rust type the engine can build from JSON-like data.
///
/// ```
/// use dson::{ConstructionRecord, Decodable, DecodeError, Schema};
///
/// #[derive(Clone)]
/// struct Person { name: String, age: Option<i64> }
///
/// impl Decodable for Person {
///     fn schema() -> Result<Schema, DecodeError> {
///         Schema::parse("({required String name, int? age}) => Person")
///     }
///     fn construct(mut record: ConstructionRecord) -> Result<Self, DecodeError> {
///         Ok(Person { name: record.take("name")?, age: record.take("age")? })
///     }
/// }
/// ```
pub trait Decodable: Clone + Send + Sync + 'static {
    fn schema() -> Result<Schema, DecodeError>;

    fn construct(record: ConstructionRecord) -> Result<Self, DecodeError>;
}

type SchemaFn = dyn Fn() -> Result<Schema, DecodeError> + Send + Sync;
type BuildFn = dyn Fn(ConstructionRecord) -> Result<Value, DecodeError> + Send + Sync;

/// Type-erased constructor reference.
#[derive(Clone)]
pub struct Constructor {
    schema: Arc<SchemaFn>,
    build: Arc<BuildFn>,
}

impl Constructor {
    pub fn of<T: Decodable>() -> Self {
        Self {
            schema: Arc::new(T::schema),
            build: Arc::new(|record: ConstructionRecord| {
                let type_id = record.type_id().to_string();
                T::construct(record).map(|value| Value::Instance(Instance::new(type_id, value)))
            }),
        }
    }

    /// A constructor for a type known only by its schema. Builds a [`DynamicObject`].
    pub fn dynamic(schema: Schema) -> Self {
        Self {
            schema: Arc::new(move || Ok(schema.clone())),
            build: Arc::new(|record: ConstructionRecord| {
                let type_id = record.type_id().to_string();
                let object =
                    DynamicObject { type_id: type_id.clone(), fields: record.into_fields() };
                Ok(Value::Instance(Instance::new(type_id, object)))
            }),
        }
    }

    pub fn schema(&self) -> Result<Schema, DecodeError> {
        (self.schema)()
    }

    pub(crate) fn build(&self, record: ConstructionRecord) -> Result<Value, DecodeError> {
        (self.build)(record)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.schema() {
            Ok(schema) => write!(f, "Constructor({})", schema.type_id),
            Err(_) => f.write_str("Constructor(<invalid signature>)"),
        }
    }
}

/// The result of a [`Constructor::dynamic`] decode: the construction record, kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObject {
    type_id: String,
    fields: IndexMap<String, Value>,
}

impl DynamicObject {
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl FromValue for DynamicObject {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Instance(instance) => instance.downcast::<DynamicObject>(),
            other => Err(ConversionError::new("DynamicObject", other.runtime_type())),
        }
    }
}
