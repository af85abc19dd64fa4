use std::fmt;

/// One named constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Declared type identifier, without the trailing `?`.
    pub ty: String,
    pub name: String,
    pub required: bool,
    pub nullable: bool,
}

impl FieldDescriptor {
    pub fn new(
        ty: impl Into<String>,
        name: impl Into<String>,
        required: bool,
        nullable: bool,
    ) -> Self {
        Self { ty: ty.into(), name: name.into(), required, nullable }
    }

    /// `required T name`
    pub fn required(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ty, name, true, false)
    }

    /// `T? name`
    pub fn optional(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ty, name, false, true)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.required {
            f.write_str("required ")?;
        }
        write!(f, "{}{} {}", self.ty, if self.nullable { "?" } else { "" }, self.name)
    }
}
