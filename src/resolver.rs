//! Value-transformation callbacks and the two-stage resolver chain.
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::DecodeError;
use crate::field::FieldDescriptor;
use crate::type_check::{self, FieldContext};
use crate::value::Value;

/// `(value, field, owning type id, alias) → value`
pub type Resolver = Arc<dyn Fn(Value, &FieldDescriptor, &str, Option<&str>) -> Value + Send + Sync>;

pub fn resolver<F>(f: F) -> Resolver
where
    F: Fn(Value, &FieldDescriptor, &str, Option<&str>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Engine defaults run first, then the call's own resolvers.
pub(crate) struct ResolverChain<'a> {
    pub defaults: &'a [Resolver],
    pub call: &'a [Resolver],
    /// Treat a mismatch in the default stage as terminal instead of suppressing it.
    pub strict_defaults: bool,
}

impl ResolverChain<'_> {
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.call.is_empty()
    }

    /// Defaults followed by call resolvers, as handed to nested strategies.
    pub fn merged(&self) -> Vec<Resolver> {
        self.defaults.iter().chain(self.call).cloned().collect()
    }

    pub fn apply(&self, value: Value, cx: &FieldContext<'_>) -> Result<Value, DecodeError> {
        if self.is_empty() {
            return type_check::check(value, cx);
        }
        let mut value = value;
        let mut checked = false;
        if !self.defaults.is_empty() {
            match fold(self.defaults, value.clone(), cx) {
                Ok(resolved) => {
                    value = resolved;
                    checked = true;
                }
                Err(error) if !self.strict_defaults => {
                    tracing::debug!(
                        type_id = cx.type_id,
                        field = %cx.field.name,
                        %error,
                        "suppressed type mismatch from default resolvers"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        if !self.call.is_empty() {
            value = fold(self.call, value, cx)?;
            checked = true;
        }
        if checked { Ok(value) } else { type_check::check(value, cx) }
    }
}

fn fold(resolvers: &[Resolver], value: Value, cx: &FieldContext<'_>) -> Result<Value, DecodeError> {
    resolvers.iter().try_fold(value, |value, resolve| {
        let resolved = resolve(value, cx.field, cx.type_id, cx.alias);
        type_check::check(resolved, cx)
    })
}

// ------------------------------- Built-ins -------------------------------- //

/// Promote integers to doubles for fields declared `double`.
pub fn int_to_double() -> Resolver {
    resolver(|value, field, _, _| match value {
        Value::Int(i) if field.ty == "double" => Value::Double(i as f64),
        other => other,
    })
}

/// Parse RFC 3339 text for fields declared `DateTime`. Text that does not parse is left alone.
pub fn date_time() -> Resolver {
    resolver(|value, field, _, _| match value {
        Value::Text(text) if field.ty == "DateTime" => {
            match DateTime::parse_from_rfc3339(&text) {
                Ok(dt) => Value::DateTime(dt.with_timezone(&Utc)),
                Err(_) => Value::Text(text),
            }
        }
        other => other,
    })
}

/// Run several resolvers as one step, so only their combined output is type-checked.
pub fn compose(resolvers: impl IntoIterator<Item = Resolver>) -> Resolver {
    let resolvers: Vec<Resolver> = resolvers.into_iter().collect();
    resolver(move |value, field, type_id, alias| {
        resolvers.iter().fold(value, |value, resolve| resolve(value, field, type_id, alias))
    })
}

/// Look a built-in resolver up by its configuration name.
pub fn builtin(name: &str) -> Option<Resolver> {
    match name {
        "int_to_double" => Some(int_to_double()),
        "date_time" => Some(date_time()),
        _ => None,
    }
}
