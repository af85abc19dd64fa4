use crate::error::DecodeError;
use crate::field::FieldDescriptor;
use crate::value::Value;

/// Which field of which type a value is being checked for.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub type_id: &'a str,
    pub field: &'a FieldDescriptor,
    /// Wire key, when it differs from the field name.
    pub alias: Option<&'a str>,
}

/// Exact match of the value's runtime type against the declared type.
///
/// Null always passes here: whether null is acceptable is the required/nullable policy's call.
pub fn check(value: Value, cx: &FieldContext<'_>) -> Result<Value, DecodeError> {
    if value.is_null() {
        return Ok(value);
    }
    let actual = value.runtime_type();
    if actual == cx.field.ty {
        Ok(value)
    } else {
        Err(DecodeError::TypeMismatch {
            actual,
            expected: cx.field.ty.clone(),
            type_id: cx.type_id.to_string(),
            field: cx.field.name.clone(),
            required: cx.field.required,
            alias: cx.alias.map(str::to_string),
        })
    }
}
