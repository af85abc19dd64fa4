//! Decode loosely-typed JSON-like values into typed Rust values without code generation.
//!
//! A target type declares its field schema (as constructor signature text or explicitly) and a
//! constructor taking a [`ConstructionRecord`]. The [`Dson`] engine walks the schema, applies
//! aliases, nested strategies and resolvers, enforces required/nullable rules and type-checks
//! every value before the constructor sees it.
//!
//! ```
//! use dson::{ConstructionRecord, Decodable, DecodeError, DecodeOptions, Dson, Nested, Schema};
//! use serde_json::json;
//!
//! #[derive(Clone, Debug)]
//! struct Pet { name: String }
//!
//! #[derive(Clone, Debug)]
//! struct Owner { name: String, pets: Vec<Pet> }
//!
//! impl Decodable for Pet {
//!     fn schema() -> Result<Schema, DecodeError> {
//!         Schema::parse("({required String name}) => Pet")
//!     }
//!     fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
//!         Ok(Pet { name: r.take("name")? })
//!     }
//! }
//!
//! impl Decodable for Owner {
//!     fn schema() -> Result<Schema, DecodeError> {
//!         Schema::parse("({required String name, required List<Pet> pets}) => Owner")
//!     }
//!     fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
//!         Ok(Owner { name: r.take("name")?, pets: r.take("pets")? })
//!     }
//! }
//!
//! let opts = DecodeOptions::new()
//!     .nested("pets", Nested::list_of::<Pet>())
//!     .alias("Owner", "name", "owner_name");
//! let owner: Owner = Dson::new()
//!     .from_json_value(&json!({"owner_name": "Ada", "pets": [{"name": "Rex"}]}), &opts)
//!     .unwrap();
//! assert_eq!(owner.pets[0].name, "Rex");
//! ```
pub mod alias;
pub mod constructor;
pub mod engine;
pub mod error;
pub mod field;
pub mod nested;
pub mod record;
pub mod resolver;
pub mod signature;
pub mod type_check;
pub mod value;

pub use alias::AliasTable;
pub use constructor::{Constructor, Decodable, DynamicObject};
pub use engine::{DecodeOptions, Dson, DsonBuilder};
pub use error::{ConversionError, DecodeError};
pub use field::FieldDescriptor;
pub use nested::{InnerMap, ListParam, Nested, NestedParam, NestedStrategy, SetParam};
pub use record::{ConstructionRecord, FromValue};
pub use resolver::{Resolver, resolver};
pub use signature::Schema;
pub use value::{Instance, Sequence, Value};
