//! Type configuration for the CLI, deserialized with JSON-path context in error messages.
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use dson::AliasTable;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Everything the CLI needs to decode documents without Rust types: a signature per type,
/// nested strategies per type and field, aliases and default resolvers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfig {
    /// type id → constructor signature, e.g. `({required String name}) => Pet`
    pub types: IndexMap<String, String>,
    #[serde(default)]
    pub nested: IndexMap<String, IndexMap<String, NestedConfig>>,
    #[serde(default)]
    pub aliases: AliasTable,
    /// Names of built-in resolvers installed as engine defaults, in order.
    #[serde(default)]
    pub resolvers: Vec<String>,
    #[serde(default)]
    pub strict_default_resolvers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedConfig {
    Object(String),
    List(String),
    Set(String),
}

impl NestedConfig {
    pub fn target(&self) -> &str {
        match self {
            NestedConfig::Object(t) | NestedConfig::List(t) | NestedConfig::Set(t) => t,
        }
    }
}

pub fn load_config(path: &Path) -> Result<TypeConfig> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read type config {}", path.display()))?;
    from_str_with_path(&source).with_context(|| format!("invalid type config {}", path.display()))
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}
