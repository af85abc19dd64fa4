//! Strategies for fields whose raw value is a map, list or set.
//!
//! The engine consults the call's [`InnerMap`] by field name. A [`Nested::Constructor`]
//! recurses into the pipeline directly; a [`Nested::Strategy`] is handed the engine and the
//! raw value and decides for itself (the built-in ones decode lists and sets element-wise).
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::alias::AliasTable;
use crate::constructor::{Constructor, Decodable};
use crate::engine::Dson;
use crate::error::DecodeError;
use crate::resolver::Resolver;
use crate::signature::Schema;
use crate::value::{Sequence, Value};

/// Field name → nested strategy, supplied per decode call.
pub type InnerMap = IndexMap<String, Nested>;

pub trait NestedStrategy: Send + Sync {
    /// Turn a composite raw value into the field's value.
    ///
    /// `inner` is the strategy map of the call that reached this field and `resolvers` the
    /// engine defaults followed by that call's resolvers.
    fn resolve(
        &self,
        engine: &Dson,
        raw: Value,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError>;
}

#[derive(Clone)]
pub enum Nested {
    /// Recurse with this constructor. Aliases carry through; the nested decode starts with an
    /// empty strategy map and only the engine's default resolvers.
    Constructor(Constructor),
    Strategy(Arc<dyn NestedStrategy>),
}

impl Nested {
    pub fn of<T: Decodable>() -> Self {
        Nested::Constructor(Constructor::of::<T>())
    }

    pub fn list_of<T: Decodable>() -> Self {
        Nested::strategy(ListParam::new(Constructor::of::<T>()))
    }

    pub fn set_of<T: Decodable>() -> Self {
        Nested::strategy(SetParam::new(Constructor::of::<T>()))
    }

    pub fn strategy(strategy: impl NestedStrategy + 'static) -> Self {
        Nested::Strategy(Arc::new(strategy))
    }
}

impl From<Constructor> for Nested {
    fn from(ctor: Constructor) -> Self {
        Nested::Constructor(ctor)
    }
}

impl fmt::Debug for Nested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nested::Constructor(ctor) => ctor.fmt(f),
            Nested::Strategy(_) => f.write_str("Strategy(..)"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILT-IN STRATEGIES
// ————————————————————————————————————————————————————————————————————————————

/// Decode every element of a list with one constructor, producing `List<Element>`.
///
/// Elements see the engine defaults once, in their own stage, followed by the call-level part
/// of the resolvers this strategy was handed.
#[derive(Clone)]
pub struct ListParam {
    ctor: Constructor,
    inner: Option<InnerMap>,
}

/// Like [`ListParam`], producing a de-duplicated `Set<Element>`.
#[derive(Clone)]
pub struct SetParam(ListParam);

/// A single nested object decoded with its own strategy map, so nesting can go deeper than
/// one level.
#[derive(Clone)]
pub struct NestedParam {
    ctor: Constructor,
    inner: InnerMap,
}

impl ListParam {
    pub fn new(ctor: Constructor) -> Self {
        Self { ctor, inner: None }
    }

    /// Use this strategy map for the elements instead of the caller's.
    pub fn with_inner(mut self, inner: InnerMap) -> Self {
        self.inner = Some(inner);
        self
    }

    fn decode_items(
        &self,
        engine: &Dson,
        raw: Value,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<(Schema, Vec<Value>), DecodeError> {
        let schema = self.ctor.schema()?;
        let items = match raw {
            Value::List(Sequence { items, .. }) | Value::Set(Sequence { items, .. }) => items,
            other => {
                return Err(DecodeError::Strategy(format!(
                    "cannot decode '{}' elements from a value of type '{}'",
                    schema.type_id,
                    other.runtime_type()
                )));
            }
        };
        let inner = self.inner.as_ref().unwrap_or(inner);
        // element decodes run the engine defaults themselves
        let resolvers = engine.call_resolvers(resolvers);
        let decoded = items
            .iter()
            .map(|item| engine.decode(item, &self.ctor, inner, resolvers, aliases))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((schema, decoded))
    }
}

impl NestedStrategy for ListParam {
    fn resolve(
        &self,
        engine: &Dson,
        raw: Value,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        let (schema, items) = self.decode_items(engine, raw, inner, resolvers, aliases)?;
        Ok(Value::typed_list(schema.type_id, items))
    }
}

impl SetParam {
    pub fn new(ctor: Constructor) -> Self {
        Self(ListParam::new(ctor))
    }

    pub fn with_inner(self, inner: InnerMap) -> Self {
        Self(self.0.with_inner(inner))
    }
}

impl NestedStrategy for SetParam {
    fn resolve(
        &self,
        engine: &Dson,
        raw: Value,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        let (schema, items) = self.0.decode_items(engine, raw, inner, resolvers, aliases)?;
        Ok(Value::typed_set(schema.type_id, items))
    }
}

impl NestedParam {
    pub fn new(ctor: Constructor, inner: InnerMap) -> Self {
        Self { ctor, inner }
    }
}

impl NestedStrategy for NestedParam {
    fn resolve(
        &self,
        engine: &Dson,
        raw: Value,
        _inner: &InnerMap,
        _resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        engine.decode(&raw, &self.ctor, &self.inner, &[], aliases)
    }
}
