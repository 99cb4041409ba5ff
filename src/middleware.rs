//! Middleware
//!
//! A middleware wraps a compiled schema with cross-cutting behavior. The
//! behavior lives in a [`Modifier`]; its configuration arguments are plain
//! fields of the modifier value. At validation time the modifier receives the
//! live `(value, object, options)` together with a one-shot [`Next`] that runs
//! the wrapped schema, and decides whether and how to call it.
//!
//! Middleware is itself a [`Validate`] implementation, so it can be compiled
//! into a [`Schema`], nested as a field, or wrapped by further middleware.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ValidationOptions;
use crate::error::{Result, SchemaResult};
use crate::report::ErrorReport;
use crate::schema::{RawSchema, Schema, Validate};

/// Behavior injected around a wrapped schema
#[async_trait]
pub trait Modifier: Send + Sync {
    async fn apply(
        &self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &ValidationOptions,
        next: Next<'_>,
    ) -> Result<Option<ErrorReport>>;
}

/// Runs the wrapped schema with the arguments the middleware was called with
pub struct Next<'a> {
    schema: &'a Schema,
    value: Option<&'a Value>,
    object: Option<&'a Value>,
    options: &'a ValidationOptions,
}

impl<'a> Next<'a> {
    /// The wrapped schema
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub async fn run(self) -> Result<Option<ErrorReport>> {
        Validate::validate(self.schema, self.value, self.object, self.options).await
    }

    /// Run the wrapped schema with substituted arguments
    pub async fn run_with(
        self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>> {
        Validate::validate(self.schema, value, object, options).await
    }
}

/// A modifier bound to the schema it wraps
pub struct Middleware<M> {
    modifier: M,
    schema: Schema,
}

impl<M: Modifier> Middleware<M> {
    /// Compile `schema` and bind `modifier` around it
    pub fn new(modifier: M, schema: impl Into<RawSchema>) -> SchemaResult<Self> {
        Ok(Self {
            modifier,
            schema: Schema::compile(schema)?,
        })
    }

    pub fn modifier(&self) -> &M {
        &self.modifier
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[async_trait]
impl<M: Modifier> Validate for Middleware<M> {
    async fn validate(
        &self,
        value: Option<&Value>,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<Option<ErrorReport>> {
        let next = Next {
            schema: &self.schema,
            value,
            object,
            options,
        };
        self.modifier.apply(value, object, options, next).await
    }

    fn field_names(&self) -> Option<Vec<String>> {
        self.schema.field_names()
    }
}

/// Wrap `schema` with `modifier` and compile the result into a [`Schema`]
pub fn create_middleware<M>(modifier: M, schema: impl Into<RawSchema>) -> SchemaResult<Schema>
where
    M: Modifier + 'static,
{
    Schema::compile(RawSchema::validator(Middleware::new(modifier, schema)?))
}
