//! Schema-only types built from a [`TypeConfig`], decoded into [`DynamicObject`]s.
//!
//! Nested strategies are wired lazily: a field's strategy looks its target type up only when
//! a value actually reaches it, so self-referential and mutually recursive types work.
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dson::{
    AliasTable, Constructor, DecodeError, Dson, InnerMap, ListParam, Nested, NestedParam,
    NestedStrategy, Resolver, Schema, SetParam, Value,
};
use indexmap::IndexMap;

use crate::path_de::{NestedConfig, TypeConfig};

pub struct TypeRegistry {
    schemas: IndexMap<String, Schema>,
    nested: IndexMap<String, IndexMap<String, NestedConfig>>,
    aliases: AliasTable,
}

/// Strategy for one configured nested field.
struct RegistryParam {
    registry: Arc<TypeRegistry>,
    config: NestedConfig,
}

impl TypeRegistry {
    /// Parse every signature and check that nested targets exist.
    pub fn from_config(config: &TypeConfig) -> Result<Arc<Self>> {
        let mut schemas = IndexMap::new();
        for (name, signature) in &config.types {
            let schema = Schema::parse(signature)
                .with_context(|| format!("type `{name}`"))?;
            if &schema.type_id != name {
                bail!("type `{name}` is declared with a signature for `{}`", schema.type_id);
            }
            schemas.insert(name.clone(), schema);
        }
        for (owner, fields) in &config.nested {
            if !schemas.contains_key(owner) {
                bail!("nested strategies declared for unknown type `{owner}`");
            }
            for (field, nested) in fields {
                if !schemas.contains_key(nested.target()) {
                    bail!("`{owner}.{field}` refers to unknown type `{}`", nested.target());
                }
            }
        }
        Ok(Arc::new(Self {
            schemas,
            nested: config.nested.clone(),
            aliases: config.aliases.clone(),
        }))
    }

    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn constructor(&self, type_id: &str) -> Result<Constructor, DecodeError> {
        self.schemas
            .get(type_id)
            .cloned()
            .map(Constructor::dynamic)
            .ok_or_else(|| DecodeError::Strategy(format!("unknown type `{type_id}`")))
    }

    /// The strategy map for fields of `type_id`.
    pub fn inner_for(self: &Arc<Self>, type_id: &str) -> InnerMap {
        let Some(fields) = self.nested.get(type_id) else {
            return InnerMap::new();
        };
        fields
            .iter()
            .map(|(field, config)| {
                let param = RegistryParam { registry: Arc::clone(self), config: config.clone() };
                (field.clone(), Nested::strategy(param))
            })
            .collect()
    }

    /// Decode one document as `root`.
    pub fn decode(
        self: &Arc<Self>,
        engine: &Dson,
        root: &str,
        value: &Value,
    ) -> Result<Value, DecodeError> {
        let ctor = self.constructor(root)?;
        engine.decode(value, &ctor, &self.inner_for(root), &[], &self.aliases)
    }
}

impl NestedStrategy for RegistryParam {
    fn resolve(
        &self,
        engine: &Dson,
        raw: Value,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        let target = self.config.target();
        let ctor = self.registry.constructor(target)?;
        let target_inner = self.registry.inner_for(target);
        match &self.config {
            NestedConfig::Object(_) => {
                NestedParam::new(ctor, target_inner).resolve(engine, raw, inner, resolvers, aliases)
            }
            NestedConfig::List(_) => ListParam::new(ctor)
                .with_inner(target_inner)
                .resolve(engine, raw, inner, resolvers, aliases),
            NestedConfig::Set(_) => SetParam::new(ctor)
                .with_inner(target_inner)
                .resolve(engine, raw, inner, resolvers, aliases),
        }
    }
}
