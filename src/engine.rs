//! The decoding engine.
//!
//! For every field of the target schema: look up the wire key, pull the raw value, give a
//! nested strategy the chance to decode composite values, run the resolver chain (which
//! type-checks after every step), apply the required/nullable policy, and record the value.
//! The finished record goes to the constructor. Any error aborts the whole decode.
use std::sync::Arc;

use crate::alias::AliasTable;
use crate::constructor::{Constructor, Decodable};
use crate::error::DecodeError;
use crate::nested::{InnerMap, Nested, NestedStrategy};
use crate::record::{ConstructionRecord, FromValue};
use crate::resolver::{Resolver, ResolverChain};
use crate::type_check::FieldContext;
use crate::value::Value;

/// Engine holding the default resolvers shared by every decode call.
#[derive(Clone, Default)]
pub struct Dson {
    resolvers: Vec<Resolver>,
    strict_default_resolvers: bool,
}

#[derive(Clone, Default)]
pub struct DsonBuilder {
    resolvers: Vec<Resolver>,
    strict_default_resolvers: bool,
}

/// Per-call inputs. Everything is optional.
#[derive(Clone, Default)]
pub struct DecodeOptions {
    pub inner: InnerMap,
    pub resolvers: Vec<Resolver>,
    pub aliases: AliasTable,
}

// ————————————————————————————————————————————————————————————————————————————
// CONFIGURATION
// ————————————————————————————————————————————————————————————————————————————

impl DsonBuilder {
    /// Append a default resolver. Defaults run before call resolvers, in this order.
    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn resolvers(mut self, resolvers: impl IntoIterator<Item = Resolver>) -> Self {
        self.resolvers.extend(resolvers);
        self
    }

    /// By default a type mismatch produced by the default resolvers is swallowed and the
    /// value from before that stage is kept. Strict mode makes it terminal like any other.
    pub fn strict_default_resolvers(mut self, strict: bool) -> Self {
        self.strict_default_resolvers = strict;
        self
    }

    pub fn build(self) -> Dson {
        Dson {
            resolvers: self.resolvers,
            strict_default_resolvers: self.strict_default_resolvers,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nested(mut self, field: impl Into<String>, nested: impl Into<Nested>) -> Self {
        self.inner.insert(field.into(), nested.into());
        self
    }

    pub fn strategy(
        self,
        field: impl Into<String>,
        strategy: impl NestedStrategy + 'static,
    ) -> Self {
        self.nested(field, Nested::strategy(strategy))
    }

    pub fn resolver(mut self, resolver: Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn alias(
        mut self,
        type_id: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.aliases.insert(type_id, field, key);
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECODING
// ————————————————————————————————————————————————————————————————————————————

impl Dson {
    /// An engine without default resolvers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DsonBuilder {
        DsonBuilder::default()
    }

    pub fn default_resolvers(&self) -> &[Resolver] {
        &self.resolvers
    }

    /// Strip this engine's defaults from the front of a merged resolver list, leaving the
    /// call-level part. A list that does not start with the defaults is returned unchanged.
    pub fn call_resolvers<'a>(&self, merged: &'a [Resolver]) -> &'a [Resolver] {
        let shared = self
            .resolvers
            .iter()
            .zip(merged)
            .take_while(|(default, given)| Arc::ptr_eq(default, given))
            .count();
        if shared == self.resolvers.len() { &merged[shared..] } else { merged }
    }

    pub fn from_json<T: Decodable>(
        &self,
        value: &Value,
        opts: &DecodeOptions,
    ) -> Result<T, DecodeError> {
        let decoded = self.decode(
            value,
            &Constructor::of::<T>(),
            &opts.inner,
            &opts.resolvers,
            &opts.aliases,
        )?;
        take_decoded(decoded)
    }

    pub fn from_json_value<T: Decodable>(
        &self,
        json: &serde_json::Value,
        opts: &DecodeOptions,
    ) -> Result<T, DecodeError> {
        self.from_json(&Value::from(json), opts)
    }

    pub fn from_str<T: Decodable>(
        &self,
        text: &str,
        opts: &DecodeOptions,
    ) -> Result<T, DecodeError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        self.from_json(&Value::from(json), opts)
    }

    /// Decode `value` with a type-erased constructor. The result is whatever the constructor
    /// builds, normally a [`Value::Instance`].
    pub fn decode(
        &self,
        value: &Value,
        ctor: &Constructor,
        inner: &InnerMap,
        resolvers: &[Resolver],
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        let schema = ctor.schema()?;
        let type_id = schema.type_id.as_str();
        let map = value.as_map().ok_or_else(|| DecodeError::NotAMap {
            type_id: type_id.to_string(),
            actual: value.runtime_type(),
        })?;
        tracing::debug!(type_id, fields = schema.fields.len(), "decoding");

        let chain = ResolverChain {
            defaults: &self.resolvers,
            call: resolvers,
            strict_defaults: self.strict_default_resolvers,
        };
        let mut record = ConstructionRecord::new(type_id);

        for field in &schema.fields {
            let alias = aliases.alias(type_id, &field.name);
            let key = alias.unwrap_or(&field.name);
            let cx = FieldContext { type_id, field, alias };

            let raw = map.get(key).cloned().unwrap_or(Value::Null);
            let raw = if raw.is_composite() {
                self.resolve_nested(raw, &cx, inner, &chain, aliases)?
            } else {
                raw
            };
            let value = chain.apply(raw, &cx)?;
            tracing::trace!(
                type_id,
                field = %field.name,
                key,
                ty = %value.runtime_type(),
                "resolved field"
            );

            if !value.is_null() {
                record.insert(field.name.clone(), value);
                continue;
            }
            match (field.required, field.nullable) {
                (true, true) => record.insert(field.name.clone(), Value::Null),
                (true, false) => {
                    return Err(DecodeError::RequiredField {
                        type_id: type_id.to_string(),
                        field: field.name.clone(),
                        alias: alias.map(str::to_string),
                    });
                }
                // left out: the constructor's own default applies
                (false, _) => {}
            }
        }

        let built = ctor.build(record)?;
        tracing::debug!(type_id, "decoded");
        Ok(built)
    }

    fn resolve_nested(
        &self,
        raw: Value,
        cx: &FieldContext<'_>,
        inner: &InnerMap,
        chain: &ResolverChain<'_>,
        aliases: &AliasTable,
    ) -> Result<Value, DecodeError> {
        match inner.get(&cx.field.name) {
            Some(Nested::Strategy(strategy)) => {
                strategy.resolve(self, raw, inner, &chain.merged(), aliases)
            }
            Some(Nested::Constructor(ctor)) => {
                self.decode(&raw, ctor, &InnerMap::new(), &[], aliases)
            }
            None => Ok(raw),
        }
    }
}

/// Unwrap a decoded value into `T`, keeping the conversion failure as the error source.
fn take_decoded<T: FromValue>(decoded: Value) -> Result<T, DecodeError> {
    let type_id = decoded.runtime_type();
    T::from_value(decoded).map_err(|source| DecodeError::Convert { type_id, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use crate::nested::{ListParam, NestedParam, SetParam};
    use crate::resolver::{self, resolver};
    use crate::signature::Schema;
    use crate::value::Instance;
    use serde::Serialize;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ------------------------------ fixtures ------------------------------ //

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Home {
        street: String,
        number: i64,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
    struct Pet {
        name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Person {
        name: String,
        age: Option<i64>,
        nickname: Option<String>,
        score: f64,
        home: Option<Home>,
        pets: Vec<Pet>,
    }

    impl Decodable for Home {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse("({required String street, required int number}) => Home")
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Home { street: r.take("street")?, number: r.take("number")? })
        }
    }

    impl Decodable for Pet {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse("({required String name}) => Pet")
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Pet { name: r.take("name")? })
        }
    }

    impl Decodable for Person {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse(
                "({required String name, int? age, required String? nickname, double score, \
                  Home? home, List<Pet> pets}) => Person",
            )
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Person {
                name: r.take("name")?,
                age: r.take("age")?,
                nickname: r.take("nickname")?,
                score: r.take_or("score", 0.0)?,
                home: r.take("home")?,
                pets: r.take_or_default("pets")?,
            })
        }
    }

    /// Records exactly what the engine handed over, for policy assertions.
    #[derive(Debug, Clone)]
    struct Captured(ConstructionRecord);

    impl Decodable for Captured {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse(
                "({required String name, int? age, required String? nickname}) => Captured",
            )
        }
        fn construct(r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Captured(r))
        }
    }

    fn person_opts() -> DecodeOptions {
        DecodeOptions::new()
            .nested("home", Nested::of::<Home>())
            .nested("pets", Nested::list_of::<Pet>())
    }

    fn upper() -> Resolver {
        resolver(|value, _, _, _| match value {
            Value::Text(s) => Value::Text(s.to_uppercase()),
            other => other,
        })
    }

    // ------------------------------- policy ------------------------------- //

    #[test]
    fn nullable_field_with_explicit_null() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada", "age": null, "nickname": null}));
        let p: Person = dson.from_json(&v, &person_opts()).unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.age, None);
    }

    #[test]
    fn missing_required_field_fails() {
        let dson = Dson::new();
        let v = Value::from(json!({"age": 30}));
        let err = dson.from_json::<Person>(&v, &person_opts()).unwrap_err();
        match err {
            DecodeError::RequiredField { type_id, field, alias } => {
                assert_eq!(type_id, "Person");
                assert_eq!(field, "name");
                assert_eq!(alias, None);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn required_field_with_explicit_null_fails() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": null}));
        assert!(matches!(
            dson.from_json::<Person>(&v, &person_opts()),
            Err(DecodeError::RequiredField { .. })
        ));
    }

    #[test]
    fn absent_optional_is_omitted_but_required_nullable_is_explicit() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada"}));
        let Captured(record) = dson.from_json::<Captured>(&v, &DecodeOptions::new()).unwrap();
        assert!(!record.contains("age"));
        assert_eq!(record.get("nickname"), Some(&Value::Null));
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "nickname"]);
    }

    #[test]
    fn constructor_default_applies_to_omitted_field() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada"}));
        let p: Person = dson.from_json(&v, &person_opts()).unwrap();
        assert_eq!(p.score, 0.0);
        assert!(p.pets.is_empty());
    }

    #[test]
    fn wrong_type_without_resolver_fails() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada", "age": "thirty"}));
        match dson.from_json::<Person>(&v, &person_opts()).unwrap_err() {
            DecodeError::TypeMismatch { actual, expected, field, required, .. } => {
                assert_eq!(actual, "String");
                assert_eq!(expected, "int");
                assert_eq!(field, "age");
                assert!(!required);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn non_map_input_fails() {
        let dson = Dson::new();
        let err =
            dson.from_json::<Pet>(&Value::from(json!([1, 2])), &DecodeOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NotAMap { ref actual, .. } if actual == "List<dynamic>"
        ));
    }

    // ------------------------------- aliases ------------------------------ //

    #[test]
    fn alias_reads_the_wire_key() {
        let dson = Dson::new();
        let opts = DecodeOptions::new().alias("Pet", "name", "pet_name");
        let v = Value::from(json!({"pet_name": "Rex", "name": "ignored"}));
        let pet: Pet = dson.from_json(&v, &opts).unwrap();
        assert_eq!(pet.name, "Rex");
    }

    #[test]
    fn alias_shows_up_in_errors() {
        let dson = Dson::new();
        let opts = DecodeOptions::new().alias("Pet", "name", "pet_name");
        let err = dson.from_json::<Pet>(&Value::from(json!({"name": "Rex"})), &opts).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::RequiredField { alias: Some(ref a), .. } if a == "pet_name"
        ));
        assert!(err.to_string().contains("pet_name"));

        let err = dson.from_json::<Pet>(&Value::from(json!({"pet_name": 1})), &opts).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'name'") && message.contains("pet_name"), "{message}");
    }

    #[test]
    fn aliases_carry_into_nested_decodes() {
        let dson = Dson::new();
        let opts = person_opts().alias("Home", "street", "st");
        let v = Value::from(json!({"name": "Ada", "home": {"st": "Main", "number": 1}}));
        let p: Person = dson.from_json(&v, &opts).unwrap();
        assert_eq!(p.home.unwrap().street, "Main");
    }

    // ------------------------------ resolvers ----------------------------- //

    #[test]
    fn call_resolvers_compose_in_order() {
        let dson = Dson::new();
        let exclaim = resolver(|value, _, _, _| match value {
            Value::Text(s) => Value::Text(format!("{s}!")),
            other => other,
        });
        // r2(r1(raw)): upper first, then exclaim
        let opts = DecodeOptions::new().resolver(upper()).resolver(exclaim);
        let pet: Pet = dson.from_json(&Value::from(json!({"name": "rex"})), &opts).unwrap();
        assert_eq!(pet.name, "REX!");
    }

    #[test]
    fn resolvers_see_field_context() {
        let dson = Dson::new();
        let seen = resolver(|value, field, type_id, alias| match (value, alias) {
            (Value::Text(_), Some(alias)) => {
                Value::Text(format!("{type_id}.{}<-{alias}", field.name))
            }
            (value, _) => value,
        });
        let opts = DecodeOptions::new().resolver(seen).alias("Pet", "name", "n");
        let pet: Pet = dson.from_json(&Value::from(json!({"n": "x"})), &opts).unwrap();
        assert_eq!(pet.name, "Pet.name<-n");
    }

    #[test]
    fn resolver_can_fill_a_missing_required_field() {
        let dson = Dson::builder()
            .resolver(resolver(|value, field, _, _| match value {
                Value::Null if field.name == "name" => Value::from("anonymous"),
                other => other,
            }))
            .build();
        let pet: Pet = dson.from_json(&Value::from(json!({})), &DecodeOptions::new()).unwrap();
        assert_eq!(pet.name, "anonymous");
    }

    #[test]
    fn default_resolver_mismatch_is_suppressed_unless_strict() {
        let break_names = || {
            resolver(|value, field, _, _| if field.name == "name" { Value::Int(7) } else { value })
        };
        let lenient = Dson::builder().resolver(break_names()).build();
        let pet: Pet =
            lenient.from_json(&Value::from(json!({"name": "Rex"})), &DecodeOptions::new()).unwrap();
        assert_eq!(pet.name, "Rex");

        let strict = Dson::builder().resolver(break_names()).strict_default_resolvers(true).build();
        assert!(matches!(
            strict.from_json::<Pet>(&Value::from(json!({"name": "Rex"})), &DecodeOptions::new()),
            Err(DecodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn builtin_resolvers_fix_numeric_and_date_fields() {
        #[derive(Debug, Clone)]
        struct Event {
            at: chrono::DateTime<chrono::Utc>,
            weight: f64,
        }
        impl Decodable for Event {
            fn schema() -> Result<Schema, DecodeError> {
                Ok(Schema::new(
                    "Event",
                    vec![
                        FieldDescriptor::required("DateTime", "at"),
                        FieldDescriptor::required("double", "weight"),
                    ],
                ))
            }
            fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
                Ok(Event { at: r.take("at")?, weight: r.take("weight")? })
            }
        }

        let v = Value::from(json!({"at": "2024-02-29T12:00:00+02:00", "weight": 3}));
        assert!(Dson::new().from_json::<Event>(&v, &DecodeOptions::new()).is_err());

        // each resolver's output is checked on its own, so `date_time` alone trips on `weight`
        // and the default stage is dropped; the call stage still fixes it
        let dson = Dson::builder().resolver(resolver::date_time()).build();
        let opts = DecodeOptions::new().resolver(resolver::int_to_double());
        let event: Event = dson.from_json(&v, &opts).unwrap();
        assert_eq!(event.weight, 3.0);
        assert_eq!(event.at.to_rfc3339(), "2024-02-29T10:00:00+00:00");

        let composed = Dson::builder()
            .resolver(resolver::compose([resolver::date_time(), resolver::int_to_double()]))
            .build();
        let event: Event = composed.from_json(&v, &DecodeOptions::new()).unwrap();
        assert_eq!(event.weight, 3.0);
    }

    // ------------------------------- nesting ------------------------------ //

    #[test]
    fn nested_object_and_typed_list() {
        let dson = Dson::new();
        let v = Value::from(json!({
            "name": "Ada",
            "home": {"street": "Main", "number": 12},
            "pets": [{"name": "Rex"}, {"name": "Tom"}]
        }));
        let p: Person = dson.from_json(&v, &person_opts()).unwrap();
        assert_eq!(p.home, Some(Home { street: "Main".into(), number: 12 }));
        assert_eq!(p.pets, vec![Pet { name: "Rex".into() }, Pet { name: "Tom".into() }]);
    }

    #[test]
    fn untyped_list_fails_declared_list_type() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada", "pets": [{"name": "Rex"}]}));
        let opts = DecodeOptions::new().nested("home", Nested::of::<Home>());
        match dson.from_json::<Person>(&v, &opts).unwrap_err() {
            DecodeError::TypeMismatch { actual, expected, .. } => {
                assert_eq!(actual, "List<dynamic>");
                assert_eq!(expected, "List<Pet>");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn nested_errors_propagate_unchanged() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "Ada", "home": {"street": "Main"}}));
        match dson.from_json::<Person>(&v, &person_opts()).unwrap_err() {
            DecodeError::RequiredField { type_id, field, .. } => {
                assert_eq!(type_id, "Home");
                assert_eq!(field, "number");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn call_resolvers_do_not_reach_constructor_recursion() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "ada", "home": {"street": "main", "number": 1}}));
        let p: Person = dson.from_json(&v, &person_opts().resolver(upper())).unwrap();
        assert_eq!(p.name, "ADA");
        assert_eq!(p.home.unwrap().street, "main");
    }

    #[test]
    fn list_param_forwards_merged_resolvers() {
        let dson = Dson::new();
        let v = Value::from(json!({"name": "ada", "pets": [{"name": "rex"}]}));
        let p: Person = dson.from_json(&v, &person_opts().resolver(upper())).unwrap();
        assert_eq!(p.pets[0].name, "REX");
    }

    #[derive(Debug, Clone)]
    struct Reading {
        weight: f64,
    }

    impl Decodable for Reading {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse("({required double weight}) => Reading")
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Reading { weight: r.take("weight")? })
        }
    }

    #[derive(Debug, Clone)]
    struct Log {
        readings: Vec<Reading>,
    }

    impl Decodable for Log {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse("({required List<Reading> readings}) => Log")
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Log { readings: r.take("readings")? })
        }
    }

    #[derive(Debug, Clone)]
    struct Batch {
        readings: Vec<Reading>,
    }

    impl Decodable for Batch {
        fn schema() -> Result<Schema, DecodeError> {
            Schema::parse("({required Set<Reading> readings}) => Batch")
        }
        fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
            Ok(Batch { readings: r.take("readings")? })
        }
    }

    #[test]
    fn list_elements_suppress_default_mismatches_like_top_level() {
        let dson = Dson::builder().resolver(resolver::date_time()).build();
        let fix_numbers = DecodeOptions::new().resolver(resolver::int_to_double());

        let single = Value::from(json!({"weight": 3}));
        let reading: Reading = dson.from_json(&single, &fix_numbers).unwrap();
        assert_eq!(reading.weight, 3.0);

        let many = Value::from(json!({"readings": [{"weight": 3}, {"weight": 4.5}]}));
        let log: Log = dson
            .from_json(&many, &fix_numbers.clone().nested("readings", Nested::list_of::<Reading>()))
            .unwrap();
        let weights: Vec<f64> = log.readings.iter().map(|r| r.weight).collect();
        assert_eq!(weights, vec![3.0, 4.5]);

        let batch: Batch = dson
            .from_json(&many, &fix_numbers.nested("readings", Nested::set_of::<Reading>()))
            .unwrap();
        assert_eq!(batch.readings.len(), 2);
    }

    #[test]
    fn default_resolvers_run_once_per_element_field() {
        let exclaim = resolver(|value, _, _, _| match value {
            Value::Text(s) => Value::Text(format!("{s}!")),
            other => other,
        });
        let dson = Dson::builder().resolver(exclaim).build();
        let v = Value::from(json!({"name": "ada", "pets": [{"name": "rex"}, {"name": "tom"}]}));

        let p: Person = dson.from_json(&v, &person_opts()).unwrap();
        assert_eq!(p.name, "ada!");
        assert_eq!(p.pets, vec![Pet { name: "rex!".into() }, Pet { name: "tom!".into() }]);

        let p: Person = dson.from_json(&v, &person_opts().resolver(upper())).unwrap();
        assert_eq!(p.name, "ADA!");
        assert_eq!(p.pets[0].name, "REX!");
    }

    #[test]
    fn call_resolvers_strip_only_a_leading_default_run() {
        let dson = Dson::builder().resolver(upper()).build();
        let call = upper();
        let merged = [dson.default_resolvers()[0].clone(), call.clone()];
        let stripped = dson.call_resolvers(&merged);
        assert_eq!(stripped.len(), 1);
        assert!(Arc::ptr_eq(&stripped[0], &call));

        // a lookalike resolver is not the engine's default
        let foreign = [upper(), call];
        assert_eq!(dson.call_resolvers(&foreign).len(), 2);
        assert!(Dson::new().call_resolvers(&foreign).len() == 2);
    }

    #[test]
    fn set_param_builds_typed_sets() {
        #[derive(Debug, Clone)]
        struct Shelter {
            pets: HashSet<Pet>,
        }
        impl Decodable for Shelter {
            fn schema() -> Result<Schema, DecodeError> {
                Schema::parse("({required Set<Pet> pets}) => Shelter")
            }
            fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
                Ok(Shelter { pets: r.take("pets")? })
            }
        }

        let dson = Dson::new();
        let opts = DecodeOptions::new().nested("pets", Nested::set_of::<Pet>());
        let v = Value::from(json!({"pets": [{"name": "Rex"}, {"name": "Rex"}, {"name": "Tom"}]}));
        let shelter: Shelter = dson.from_json(&v, &opts).unwrap();
        // distinct decodes are distinct instances; equal data collapses only in the Rust set
        assert_eq!(shelter.pets.len(), 2);

        let v = Value::from(json!({"pets": {"name": "Rex"}}));
        assert!(matches!(dson.from_json::<Shelter>(&v, &opts), Err(DecodeError::Strategy(_))));
    }

    #[test]
    fn nested_param_reaches_deeper_levels() {
        #[derive(Debug, Clone)]
        struct Street {
            home: Home,
        }
        impl Decodable for Street {
            fn schema() -> Result<Schema, DecodeError> {
                Schema::parse("({required Home home}) => Street")
            }
            fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
                Ok(Street { home: r.take("home")? })
            }
        }
        #[derive(Debug, Clone)]
        struct City {
            street: Street,
        }
        impl Decodable for City {
            fn schema() -> Result<Schema, DecodeError> {
                Schema::parse("({required Street street}) => City")
            }
            fn construct(mut r: ConstructionRecord) -> Result<Self, DecodeError> {
                Ok(City { street: r.take("street")? })
            }
        }

        let v = Value::from(json!({"street": {"home": {"street": "Main", "number": 3}}}));
        let dson = Dson::new();

        // a bare constructor does not forward the strategy map
        let shallow = DecodeOptions::new()
            .nested("street", Nested::of::<Street>())
            .nested("home", Nested::of::<Home>());
        assert!(matches!(
            dson.from_json::<City>(&v, &shallow),
            Err(DecodeError::TypeMismatch { ref expected, .. }) if expected == "Home"
        ));

        let inner = DecodeOptions::new().nested("home", Nested::of::<Home>()).inner;
        let deep = DecodeOptions::new()
            .strategy("street", NestedParam::new(Constructor::of::<Street>(), inner));
        let city: City = dson.from_json(&v, &deep).unwrap();
        assert_eq!(city.street.home.number, 3);
    }

    #[test]
    fn custom_strategy_receives_call_context() {
        struct CountingStrategy {
            calls: Arc<AtomicUsize>,
        }
        impl NestedStrategy for CountingStrategy {
            fn resolve(
                &self,
                engine: &Dson,
                raw: Value,
                inner: &InnerMap,
                resolvers: &[Resolver],
                aliases: &AliasTable,
            ) -> Result<Value, DecodeError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                assert!(inner.contains_key("home"));
                assert_eq!(resolvers.len(), 2);
                ListParam::new(Constructor::of::<Pet>())
                    .resolve(engine, raw, inner, resolvers, aliases)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let dson = Dson::builder().resolver(upper()).build();
        let opts = DecodeOptions::new()
            .nested("home", Nested::of::<Home>())
            .strategy("pets", CountingStrategy { calls: calls.clone() })
            .resolver(upper());
        let v = Value::from(json!({"name": "ada", "pets": [{"name": "rex"}]}));
        let p: Person = dson.from_json(&v, &opts).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.pets[0].name, "REX");
    }

    #[test]
    fn scalars_bypass_nested_strategies() {
        let dson = Dson::new();
        let strategy_map =
            DecodeOptions::new().strategy("name", SetParam::new(Constructor::of::<Pet>()));
        let pet: Pet = dson.from_json(&Value::from(json!({"name": "Rex"})), &strategy_map).unwrap();
        assert_eq!(pet.name, "Rex");
    }

    #[test]
    fn composite_without_strategy_passes_through() {
        let dson = Dson::new();
        let schema = Schema::parse("({Map<String, dynamic> meta}) => Doc").unwrap();
        let v = Value::from(json!({"meta": {"k": 1}}));
        let decoded = dson
            .decode(&v, &Constructor::dynamic(schema), &InnerMap::new(), &[], &AliasTable::new())
            .unwrap();
        assert_eq!(decoded.to_json().unwrap(), json!({"meta": {"k": 1}}));
    }

    #[test]
    fn nested_instances_can_be_supplied_directly() {
        let dson = Dson::new();
        let home =
            Value::Instance(Instance::new("Home", Home { street: "Main".into(), number: 1 }));
        let mut map = indexmap::IndexMap::new();
        map.insert("name".to_string(), Value::from("Ada"));
        map.insert("home".to_string(), home);
        let p: Person = dson.from_json(&Value::Map(map), &person_opts()).unwrap();
        assert_eq!(p.home.map(|h| h.number), Some(1));
    }

    // ------------------------------ round trip ---------------------------- //

    #[test]
    fn serialized_instance_decodes_back_to_itself() {
        let original = Person {
            name: "Ada".into(),
            age: Some(36),
            nickname: None,
            score: 9.5,
            home: Some(Home { street: "Main".into(), number: 12 }),
            pets: vec![Pet { name: "Rex".into() }],
        };
        let json = serde_json::to_value(&original).unwrap();
        let decoded: Person = Dson::new().from_json_value(&json, &person_opts()).unwrap();
        assert_eq!(decoded, original);

        let text = serde_json::to_string(&original).unwrap();
        let decoded: Person = Dson::new().from_str(&text, &person_opts()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_target_type_is_a_conversion_error() {
        match take_decoded::<Pet>(Value::Int(1)).unwrap_err() {
            DecodeError::Convert { type_id, source } => {
                assert_eq!(type_id, "int");
                assert_eq!(source.actual, "int");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn invalid_text_is_a_json_error() {
        let err = Dson::new().from_str::<Pet>("{not json", &DecodeOptions::new()).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dson>();
        assert_send_sync::<DecodeOptions>();
        assert_send_sync::<Value>();
    }
}
