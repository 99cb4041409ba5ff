//! Field middleware: optional, required, name and only.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{DEFAULT_UNKNOWN_FIELD_MESSAGE, ValidationOptions};
use crate::error::{Result, SchemaResult};
use crate::middleware::{Modifier, Next, create_middleware};
use crate::report::ErrorReport;
use crate::schema::{RawSchema, Schema};

/// Absent values (and values matched by `ignore_value_if_optional`) are valid
#[derive(Debug, Clone, Copy, Default)]
pub struct Optional;

#[async_trait]
impl Modifier for Optional {
    async fn apply(
        &self,
        value: Option<&Value>,
        _object: Option<&Value>,
        options: &ValidationOptions,
        next: Next<'_>,
    ) -> Result<Option<ErrorReport>> {
        match value {
            None => {
                tracing::trace!("optional value absent");
                Ok(None)
            }
            Some(value) if options.ignores(value) => {
                tracing::trace!("optional value ignored");
                Ok(None)
            }
            Some(_) => next.run().await,
        }
    }
}

/// Absent values report `message` instead of the required-message option
#[derive(Debug, Clone)]
pub struct Required {
    pub message: String,
}

#[async_trait]
impl Modifier for Required {
    async fn apply(
        &self,
        value: Option<&Value>,
        _object: Option<&Value>,
        _options: &ValidationOptions,
        next: Next<'_>,
    ) -> Result<Option<ErrorReport>> {
        match value {
            None => Ok(Some(ErrorReport::message(self.message.clone()))),
            Some(_) => next.run().await,
        }
    }
}

/// Replaces `{name}` in flat message lists with `label`.
///
/// Field mappings are returned untouched.
#[derive(Debug, Clone)]
pub struct Name {
    pub label: String,
}

#[async_trait]
impl Modifier for Name {
    async fn apply(
        &self,
        _value: Option<&Value>,
        _object: Option<&Value>,
        _options: &ValidationOptions,
        next: Next<'_>,
    ) -> Result<Option<ErrorReport>> {
        let report = next.run().await?;
        Ok(report.map(|report| match report {
            ErrorReport::Messages(messages) => ErrorReport::Messages(
                messages
                    .into_iter()
                    .map(|message| message.replace("{name}", &self.label))
                    .collect(),
            ),
            fields @ ErrorReport::Fields(_) => fields,
        }))
    }
}

/// Rejects object keys the wrapped object schema does not declare
#[derive(Debug, Clone, Default)]
pub struct Only {
    /// Takes precedence over `unknown_field_message` in the options
    pub template: Option<String>,
}

#[async_trait]
impl Modifier for Only {
    async fn apply(
        &self,
        value: Option<&Value>,
        _object: Option<&Value>,
        options: &ValidationOptions,
        next: Next<'_>,
    ) -> Result<Option<ErrorReport>> {
        if let (Some(Value::Object(map)), Some(declared)) = (value, next.schema().field_names()) {
            let template = self
                .template
                .as_deref()
                .or(options.unknown_field_message.as_deref())
                .unwrap_or(DEFAULT_UNKNOWN_FIELD_MESSAGE);

            let unknown: Vec<String> = map
                .keys()
                .filter(|key| !declared.contains(*key))
                .map(|key| template.replace("{field}", key))
                .collect();

            if !unknown.is_empty() {
                tracing::trace!(unknown = unknown.len(), "rejected unknown fields");
                return Ok(Some(ErrorReport::Messages(unknown)));
            }
        }

        next.run().await
    }
}

/// Make a schema optional
pub fn optional(schema: impl Into<RawSchema>) -> SchemaResult<Schema> {
    create_middleware(Optional, schema)
}

/// Give a schema an explicit required message
pub fn required(message: impl Into<String>, schema: impl Into<RawSchema>) -> SchemaResult<Schema> {
    create_middleware(
        Required {
            message: message.into(),
        },
        schema,
    )
}

/// Substitute `{name}` in the schema's messages
pub fn name(label: impl Into<String>, schema: impl Into<RawSchema>) -> SchemaResult<Schema> {
    create_middleware(
        Name {
            label: label.into(),
        },
        schema,
    )
}

/// Reject unknown fields using the options' template or the default one
pub fn only(schema: impl Into<RawSchema>) -> SchemaResult<Schema> {
    create_middleware(Only::default(), schema)
}

/// Reject unknown fields with an explicit `{field}` template
pub fn only_with(template: impl Into<String>, schema: impl Into<RawSchema>) -> SchemaResult<Schema> {
    create_middleware(
        Only {
            template: Some(template.into()),
        },
        schema,
    )
}
