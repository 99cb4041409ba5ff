//! Schema Compilation and Validation Engine
//!
//! A [`RawSchema`] is compiled once into an immutable [`Schema`] that can be
//! shared and reused across any number of concurrent validation runs:
//! - **Value schemas** map messages to predicates and validate a single value
//! - **Object schemas** map field names to nested schemas
//! - **Adapters** wrap any [`Validate`] implementation, including middleware
//!
//! Within one run every predicate of a value, and every field of an object, is
//! dispatched concurrently and joined with `join_all`. Every dispatched check
//! runs to completion before the first operational error is surfaced, and
//! messages are reassembled in declaration order regardless of completion
//! order.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::config::{OptionsLayer, ValidationOptions};
use crate::error::{Result, SchemaError, SchemaResult, ValidationError};
use crate::predicate::Predicate;
use crate::report::ErrorReport;

/// The validation capability shared by compiled schemas, middleware and
/// hand-written validators.
///
/// `options` are already resolved. Implementations report invalid data through
/// the returned [`ErrorReport`] and reserve `Err` for operational failures.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(
        &self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>>;

    /// Declared field names, for validators that wrap an object schema
    fn field_names(&self) -> Option<Vec<String>> {
        None
    }
}

/// A caller-supplied schema definition, not yet compiled
#[derive(Clone)]
pub enum RawSchema {
    /// Already compiled; compilation returns it unchanged
    Compiled(Schema),
    /// Adopted directly as the compiled validator
    Validator(Arc<dyn Validate>),
    /// Ordered `(key, entry)` pairs, classified by the first entry
    Definition(Vec<(String, Entry)>),
    /// A plain JSON value, which can never describe validation rules
    Literal(Value),
}

/// One entry of a [`RawSchema::Definition`]
#[derive(Clone)]
pub enum Entry {
    Predicate(Predicate),
    Schema(RawSchema),
    Literal(Value),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Predicate(_) => "predicate",
            Entry::Schema(_) => "nested schema",
            Entry::Literal(_) => "literal",
        }
    }
}

impl RawSchema {
    /// Declarative definition; the first entry decides the shape
    pub fn definition<I, K, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Entry>,
    {
        RawSchema::Definition(
            entries
                .into_iter()
                .map(|(key, entry)| (key.into(), entry.into()))
                .collect(),
        )
    }

    /// Value schema: message → predicate, in declaration order
    pub fn values<I, K>(checks: I) -> Self
    where
        I: IntoIterator<Item = (K, Predicate)>,
        K: Into<String>,
    {
        Self::definition(checks)
    }

    /// Object schema: field name → nested schema
    pub fn object<I, K, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<RawSchema>,
    {
        Self::definition(
            fields
                .into_iter()
                .map(|(key, schema)| (key, Entry::from(schema.into()))),
        )
    }

    /// Pass-through adapter around a hand-written validator
    pub fn validator(validator: impl Validate + 'static) -> Self {
        RawSchema::Validator(Arc::new(validator))
    }
}

impl From<Schema> for RawSchema {
    fn from(schema: Schema) -> Self {
        RawSchema::Compiled(schema)
    }
}

impl From<Value> for RawSchema {
    fn from(value: Value) -> Self {
        RawSchema::Literal(value)
    }
}

impl From<Predicate> for Entry {
    fn from(predicate: Predicate) -> Self {
        Entry::Predicate(predicate)
    }
}

/// Scalar literals stay literals so classification can reject them by key
impl From<RawSchema> for Entry {
    fn from(schema: RawSchema) -> Self {
        match schema {
            RawSchema::Literal(value) if !value.is_object() => Entry::Literal(value),
            schema => Entry::Schema(schema),
        }
    }
}

impl From<Schema> for Entry {
    fn from(schema: Schema) -> Self {
        Entry::Schema(RawSchema::Compiled(schema))
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Entry::Literal(value)
    }
}

impl fmt::Debug for RawSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawSchema::Compiled(schema) => write!(f, "{:?}", schema),
            RawSchema::Validator(_) => write!(f, "<validator>"),
            RawSchema::Literal(value) => write!(f, "{}", value),
            RawSchema::Definition(entries) => {
                write!(f, "{{")?;
                for (i, (key, entry)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: ", key)?;
                    match entry {
                        Entry::Predicate(_) => write!(f, "<predicate>")?,
                        Entry::Schema(schema) => write!(f, "{:?}", schema)?,
                        Entry::Literal(value) => write!(f, "{}", value)?,
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

/// Shape of a compiled schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Value,
    Object,
    Adapter,
}

/// Shape of a declarative definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Value,
    Object,
}

impl Shape {
    fn describe(self) -> &'static str {
        match self {
            Shape::Value => "value schema",
            Shape::Object => "object schema",
        }
    }
}

#[derive(Clone)]
enum Compiled {
    Value(ValueValidator),
    Object(ObjectValidator),
    Adapter(Arc<dyn Validate>),
}

struct SchemaInner {
    compiled: Compiled,
    defaults: OptionsLayer,
}

/// An immutable, compiled schema. Cloning shares the compiled structure.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Schema");
        s.field("kind", &self.kind());
        match &self.inner.compiled {
            Compiled::Value(v) => {
                s.field(
                    "messages",
                    &v.checks.iter().map(|(m, _)| m.as_str()).collect::<Vec<_>>(),
                );
            }
            Compiled::Object(o) => {
                s.field(
                    "fields",
                    &o.fields.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
                );
            }
            Compiled::Adapter(_) => {}
        }
        s.field("defaults", &self.inner.defaults).finish()
    }
}

impl Schema {
    /// Compile a raw schema.
    ///
    /// Compiling a `Schema` returns it unchanged. Nested object fields are
    /// compiled eagerly, so a malformed definition anywhere fails here.
    pub fn compile(raw: impl Into<RawSchema>) -> SchemaResult<Schema> {
        match raw.into() {
            RawSchema::Compiled(schema) => Ok(schema),
            RawSchema::Validator(validator) => {
                tracing::debug!("compiled adapter schema");
                Ok(Self::from_compiled(Compiled::Adapter(validator)))
            }
            RawSchema::Definition(entries) => Self::compile_definition(entries),
            RawSchema::Literal(value) => Self::compile_literal(value),
        }
    }

    fn from_compiled(compiled: Compiled) -> Self {
        Self {
            inner: Arc::new(SchemaInner {
                compiled,
                defaults: OptionsLayer::default(),
            }),
        }
    }

    fn compile_definition(entries: Vec<(String, Entry)>) -> SchemaResult<Schema> {
        let compiled = match classify(&entries)? {
            Shape::Value => {
                let checks = entries
                    .into_iter()
                    .filter_map(|(message, entry)| match entry {
                        Entry::Predicate(predicate) => Some((message, predicate)),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                tracing::debug!(checks = checks.len(), "compiled value schema");
                Compiled::Value(ValueValidator { checks })
            }
            Shape::Object => {
                let mut fields = Vec::with_capacity(entries.len());
                for (field, entry) in entries {
                    if let Entry::Schema(raw) = entry {
                        fields.push((field, Schema::compile(raw)?));
                    }
                }
                tracing::debug!(fields = fields.len(), "compiled object schema");
                Compiled::Object(ObjectValidator { fields })
            }
        };
        Ok(Self::from_compiled(compiled))
    }

    fn compile_literal(value: Value) -> SchemaResult<Schema> {
        match value {
            Value::Object(map) => {
                let entries = map
                    .into_iter()
                    .map(|(key, value)| (key, Entry::from(RawSchema::Literal(value))))
                    .collect();
                Self::compile_definition(entries)
            }
            other => Err(SchemaError::UnsupportedDefinition {
                definition: other.to_string(),
            }),
        }
    }

    /// Attach schema-level option defaults, layered under call-site options.
    ///
    /// Defaults are resolved only where validation starts, in
    /// [`Schema::validate`] and [`Schema::validate_with`]. When this schema
    /// runs as a field of another schema or inside middleware it receives the
    /// caller's already resolved options, and its own defaults do not apply.
    /// Attach defaults to the outermost schema instead.
    pub fn with_defaults(&self, defaults: OptionsLayer) -> Schema {
        Self {
            inner: Arc::new(SchemaInner {
                compiled: self.inner.compiled.clone(),
                defaults: self.inner.defaults.clone().merged(&defaults),
            }),
        }
    }

    pub fn defaults(&self) -> &OptionsLayer {
        &self.inner.defaults
    }

    pub fn kind(&self) -> SchemaKind {
        match &self.inner.compiled {
            Compiled::Value(_) => SchemaKind::Value,
            Compiled::Object(_) => SchemaKind::Object,
            Compiled::Adapter(_) => SchemaKind::Adapter,
        }
    }

    /// Declared fields of an object schema, seen through any adapters
    pub fn field_names(&self) -> Option<Vec<String>> {
        match &self.inner.compiled {
            Compiled::Value(_) => None,
            Compiled::Object(o) => Some(o.fields.iter().map(|(k, _)| k.clone()).collect()),
            Compiled::Adapter(validator) => validator.field_names(),
        }
    }

    /// Whether both handles share one compiled structure
    pub fn ptr_eq(a: &Schema, b: &Schema) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Validate a top-level value. `None` means the value is absent.
    pub async fn validate(
        &self,
        value: Option<&Value>,
        options: &OptionsLayer,
    ) -> Result<Option<ErrorReport>> {
        self.validate_with(value, None, options).await
    }

    /// Validate a value that lives inside `object`
    pub async fn validate_with(
        &self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &OptionsLayer,
    ) -> Result<Option<ErrorReport>> {
        let options = ValidationOptions::resolve([&self.inner.defaults, options]);
        Validate::validate(self, value, object, &options).await
    }
}

#[async_trait]
impl Validate for Schema {
    async fn validate(
        &self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>> {
        tracing::trace!(kind = ?self.kind(), present = value.is_some(), "validating");

        let report = match (&self.inner.compiled, value) {
            (Compiled::Adapter(validator), _) => validator.validate(value, object, options).await?,
            (_, None) => Some(ErrorReport::message(options.is_required_message.clone())),
            (Compiled::Value(v), Some(value)) => v.validate(value, object, options).await?,
            (Compiled::Object(o), Some(value)) => o.validate(value, options).await?,
        };

        Ok(report.and_then(ErrorReport::non_empty))
    }

    fn field_names(&self) -> Option<Vec<String>> {
        Schema::field_names(self)
    }
}

/// Decide the shape of a definition from its first entry, then require every
/// other entry to agree.
fn classify(entries: &[(String, Entry)]) -> SchemaResult<Shape> {
    let Some((first_key, first)) = entries.first() else {
        return Err(SchemaError::EmptyDefinition {
            definition: "{}".to_string(),
        });
    };

    let shape = match first {
        Entry::Predicate(_) => Shape::Value,
        Entry::Schema(_) => Shape::Object,
        Entry::Literal(value) => {
            return Err(SchemaError::UnsupportedEntry {
                key: first_key.clone(),
                found: value.to_string(),
            });
        }
    };

    let mut seen = HashSet::with_capacity(entries.len());
    for (key, entry) in entries {
        if !seen.insert(key.as_str()) {
            return Err(SchemaError::DuplicateKey { key: key.clone() });
        }
        let agrees = matches!(
            (shape, entry),
            (Shape::Value, Entry::Predicate(_)) | (Shape::Object, Entry::Schema(_))
        );
        if !agrees {
            return Err(SchemaError::MixedDefinition {
                key: key.clone(),
                expected: shape.describe(),
                found: entry.kind(),
            });
        }
    }

    Ok(shape)
}

#[derive(Clone)]
struct ValueValidator {
    checks: Vec<(String, Predicate)>,
}

impl ValueValidator {
    async fn validate(
        &self,
        value: &Value,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>> {
        let outcomes = join_all(self.checks.iter().map(|(message, predicate)| async move {
            let accepted = predicate.evaluate(message, value, object, options).await?;
            Ok::<_, ValidationError>((!accepted).then(|| message.clone()))
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let mut messages: Vec<String> = outcomes.into_iter().flatten().collect();
        if options.fail_fast {
            messages.truncate(1);
        }

        Ok(ErrorReport::Messages(messages).non_empty())
    }
}

#[derive(Clone)]
struct ObjectValidator {
    fields: Vec<(String, Schema)>,
}

impl ObjectValidator {
    async fn validate(
        &self,
        value: &Value,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>> {
        let reports = join_all(self.fields.iter().map(|(field, schema)| async move {
            let report =
                Validate::validate(schema, value.get(field.as_str()), Some(value), options).await?;
            Ok::<_, ValidationError>(report.map(|report| (field.clone(), report)))
        }))
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        let fields: BTreeMap<String, ErrorReport> = reports.into_iter().flatten().collect();
        Ok(ErrorReport::Fields(fields).non_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greater_than(n: i64) -> Predicate {
        Predicate::new(move |v| v.as_i64().is_some_and(|x| x > n))
    }

    fn even() -> Predicate {
        Predicate::new(|v| v.as_i64().is_some_and(|x| x % 2 == 0))
    }

    #[test]
    fn test_empty_definition_fails() {
        let err = Schema::compile(RawSchema::definition(Vec::<(String, Entry)>::new())).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyDefinition { .. }));

        let err = Schema::compile(json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyDefinition { .. }));
    }

    #[test]
    fn test_non_object_definition_fails() {
        let err = Schema::compile(json!([])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedDefinition {
                definition: "[]".to_string()
            }
        );
    }

    #[test]
    fn test_bad_first_entry_fails() {
        let err = Schema::compile(json!({"message": 1})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedEntry {
                key: "message".to_string(),
                found: "1".to_string()
            }
        );
    }

    #[test]
    fn test_nested_literal_fails_at_compile_time() {
        let err = Schema::compile(RawSchema::object([("key", json!({"inner": 1}))])).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedEntry { key, .. } if key == "inner"));
    }

    #[test]
    fn test_mixed_definition_fails() {
        let raw = RawSchema::definition([
            ("message", Entry::from(greater_than(5))),
            ("key", Entry::from(RawSchema::values([("m", even())]))),
        ]);

        let err = Schema::compile(raw).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MixedDefinition {
                key: "key".to_string(),
                expected: "value schema",
                found: "nested schema",
            }
        );
    }

    #[test]
    fn test_duplicate_key_fails() {
        let raw = RawSchema::values([("message", greater_than(5)), ("message", even())]);
        assert!(matches!(
            Schema::compile(raw),
            Err(SchemaError::DuplicateKey { key }) if key == "message"
        ));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let schema = Schema::compile(RawSchema::values([("message", greater_than(5))])).unwrap();
        let again = Schema::compile(schema.clone()).unwrap();
        assert!(Schema::ptr_eq(&schema, &again));
    }

    #[test]
    fn test_kinds_and_field_names() {
        let value = Schema::compile(RawSchema::values([("message", greater_than(5))])).unwrap();
        assert_eq!(value.kind(), SchemaKind::Value);
        assert!(value.field_names().is_none());

        let object = Schema::compile(RawSchema::object([
            ("b", value.clone()),
            ("a", value.clone()),
        ]))
        .unwrap();
        assert_eq!(object.kind(), SchemaKind::Object);
        assert_eq!(
            object.field_names(),
            Some(vec!["b".to_string(), "a".to_string()])
        );
    }

    #[tokio::test]
    async fn test_value_schema() {
        let schema = Schema::compile(RawSchema::values([("message", greater_than(5))])).unwrap();
        let options = OptionsLayer::default();

        assert_eq!(
            schema.validate(Some(&json!(4)), &options).await.unwrap(),
            Some(ErrorReport::message("message"))
        );
        assert_eq!(schema.validate(Some(&json!(6)), &options).await.unwrap(), None);
        assert_eq!(
            schema.validate(None, &options).await.unwrap(),
            Some(ErrorReport::message("is required"))
        );
    }

    #[tokio::test]
    async fn test_object_schema_fail_fast() {
        let schema = Schema::compile(RawSchema::object([(
            "key",
            RawSchema::values([("message", greater_than(5)), ("message2", even())]),
        )]))
        .unwrap();

        let report = schema
            .validate(Some(&json!({"key": 3})), &OptionsLayer::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            report.field("key").and_then(ErrorReport::as_messages),
            Some(&["message".to_string(), "message2".to_string()][..])
        );

        let report = schema
            .validate(Some(&json!({"key": 3})), &OptionsLayer::new().fail_fast(true))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            report.field("key").and_then(ErrorReport::as_messages),
            Some(&["message".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_schema_defaults_layer_under_call_options() {
        let schema = Schema::compile(RawSchema::values([("message", greater_than(5))]))
            .unwrap()
            .with_defaults(OptionsLayer::new().required_message("must exist"));

        assert_eq!(
            schema.validate(None, &OptionsLayer::default()).await.unwrap(),
            Some(ErrorReport::message("must exist"))
        );
        assert_eq!(
            schema
                .validate(None, &OptionsLayer::new().required_message("needed"))
                .await
                .unwrap(),
            Some(ErrorReport::message("needed"))
        );
    }

    #[tokio::test]
    async fn test_defaults_apply_only_at_entry_point() {
        let inner = Schema::compile(RawSchema::values([("message", greater_than(5))]))
            .unwrap()
            .with_defaults(OptionsLayer::new().required_message("inner default"));
        assert_eq!(
            inner.validate(None, &OptionsLayer::default()).await.unwrap(),
            Some(ErrorReport::message("inner default"))
        );

        let outer = Schema::compile(RawSchema::object([("key", inner.clone())])).unwrap();
        let report = outer
            .validate(Some(&json!({})), &OptionsLayer::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.field("key"), Some(&ErrorReport::message("is required")));

        let outer = outer.with_defaults(inner.defaults().clone());
        let report = outer
            .validate(Some(&json!({})), &OptionsLayer::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.field("key"), Some(&ErrorReport::message("inner default")));
    }

    #[tokio::test]
    async fn test_non_object_value_reports_every_field() {
        let schema = Schema::compile(RawSchema::object([(
            "key",
            RawSchema::values([("message", greater_than(5))]),
        )]))
        .unwrap();

        let report = schema
            .validate(Some(&json!(3)), &OptionsLayer::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.field("key"), Some(&ErrorReport::message("is required")));
    }
}
