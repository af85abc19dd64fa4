use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-type renames between field names and wire keys: `type id → (field name → wire key)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(IndexMap<String, IndexMap<String, String>>);

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        type_id: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.insert(type_id, field, key);
        self
    }

    pub fn insert(
        &mut self,
        type_id: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
    ) {
        self.0.entry(type_id.into()).or_default().insert(field.into(), key.into());
    }

    /// The registered alias, if any.
    pub fn alias(&self, type_id: &str, field: &str) -> Option<&str> {
        self.0.get(type_id)?.get(field).map(String::as_str)
    }

    /// Key to read from the input map; the field name itself unless aliased.
    pub fn key_for<'a>(&'a self, type_id: &str, field: &'a str) -> &'a str {
        self.alias(type_id, field).unwrap_or(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(IndexMap::is_empty)
    }
}

impl From<IndexMap<String, IndexMap<String, String>>> for AliasTable {
    fn from(table: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self(table)
    }
}
