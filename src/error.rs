//! Error types for the decoding pipeline.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The constructor does not expose an all-named-parameter signature.
    #[error("positional parameters not allowed: cannot read named parameters from `{signature}`")]
    Signature { signature: String },

    /// A single parameter entry inside an otherwise well-formed signature.
    #[error("malformed parameter `{entry}` in signature of `{type_id}`")]
    SignatureEntry { type_id: String, entry: String },

    #[error(
        "{type_id}.{field}{} is required and not nullable, but no value was provided",
        alias_suffix(.alias)
    )]
    RequiredField {
        type_id: String,
        field: String,
        alias: Option<String>,
    },

    #[error(
        "type '{actual}' is not a subtype of type '{expected}' of {} field '{field}'{} \
         in '{type_id}'",
        required_label(.required),
        alias_suffix(.alias)
    )]
    TypeMismatch {
        actual: String,
        expected: String,
        type_id: String,
        field: String,
        required: bool,
        alias: Option<String>,
    },

    #[error("cannot decode '{type_id}' from a value of type '{actual}', expected a map")]
    NotAMap { type_id: String, actual: String },

    #[error("cannot construct '{type_id}': field '{field}': {source}")]
    Construct {
        type_id: String,
        field: String,
        #[source]
        source: ConversionError,
    },

    /// The decoded value is not the Rust type the caller asked for.
    #[error("decoded '{type_id}' cannot be taken as the requested type: {source}")]
    Convert {
        type_id: String,
        #[source]
        source: ConversionError,
    },

    #[error("{0}")]
    Strategy(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A record entry could not be turned into the Rust type a constructor asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, found '{actual}'")]
pub struct ConversionError {
    pub expected: String,
    pub actual: String,
}

impl ConversionError {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self { expected: expected.into(), actual: actual.into() }
    }
}

fn required_label(required: &bool) -> &'static str {
    if *required { "required" } else { "optional" }
}

fn alias_suffix(alias: &Option<String>) -> String {
    match alias {
        Some(alias) => format!(" (read from key '{alias}')"),
        None => String::new(),
    }
}
