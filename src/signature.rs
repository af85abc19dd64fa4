//! Field schemas and the signature parser.
//!
//! A schema is read from the printed form of a named-parameter constructor:
//!
//! ```text
//! ({required String name, int? age, Map<String, dynamic> extra}) => Person
//! ```
//!
//! Entries are split on top-level commas (commas inside `<...>` belong to a generic type),
//! then on whitespace: the last token is the field name, everything between the modifiers
//! and the name is the type. A trailing `?` on the type marks the field nullable.
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DecodeError;
use crate::field::FieldDescriptor;

static SIGNATURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:Closure:\s*)?\(\{(?P<params>.*)\}\)\s*=>\s*(?P<class>\S+)\s*$")
        .expect("signature pattern is valid")
});

const REQUIRED: &str = "required";
const MODIFIERS: &[&str] = &[REQUIRED, "final", "covariant"];

/// Ordered field descriptors of one target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub type_id: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Declare a schema explicitly instead of parsing one.
    pub fn new(type_id: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self { type_id: type_id.into(), fields }
    }

    pub fn parse(signature: &str) -> Result<Self, DecodeError> {
        let caps = SIGNATURE_RE.captures(signature).ok_or_else(|| DecodeError::Signature {
            signature: signature.to_string(),
        })?;
        let type_id = caps["class"].to_string();
        let fields = split_top_level(&caps["params"])
            .into_iter()
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| parse_entry(&type_id, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { type_id, fields })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("({")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        write!(f, "}}) => {}", self.type_id)
    }
}

fn parse_entry(type_id: &str, entry: &str) -> Result<FieldDescriptor, DecodeError> {
    let malformed = || DecodeError::SignatureEntry {
        type_id: type_id.to_string(),
        entry: entry.to_string(),
    };
    let tokens: Vec<&str> = entry.split_whitespace().collect();
    let (name, rest) = tokens.split_last().ok_or_else(malformed)?;
    let required = rest.contains(&REQUIRED);
    let ty_tokens: Vec<&str> = rest
        .iter()
        .copied()
        .skip_while(|t| MODIFIERS.contains(t))
        .collect();
    if ty_tokens.is_empty() {
        return Err(malformed());
    }
    let ty = ty_tokens.join(" ");
    let (ty, nullable) = match ty.strip_suffix('?') {
        Some(stripped) => (stripped.to_string(), true),
        None => (ty, false),
    };
    Ok(FieldDescriptor::new(ty, *name, required, nullable))
}

fn split_top_level(params: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(&params[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&params[start..]);
    out
}
