//! # validate-schema Library
//!
//! Composable, async-first value validation. A declarative schema (messages
//! mapped to predicates, or field names mapped to nested schemas) is compiled
//! once into an immutable [`Schema`], then used to validate any number of
//! `serde_json::Value` documents concurrently. Middleware such as
//! [`optional`] and [`required`] wraps compiled schemas without the wrapped
//! schema knowing about it.
//!
//! ```
//! use serde_json::json;
//! use validate_schema::{ErrorReport, OptionsLayer, Predicate, RawSchema, Schema};
//!
//! # tokio_test::block_on(async {
//! let schema = Schema::compile(RawSchema::object([(
//!     "age",
//!     RawSchema::values([(
//!         "must be an adult",
//!         Predicate::new(|v| v.as_u64().is_some_and(|age| age >= 18)),
//!     )]),
//! )]))?;
//!
//! let report = schema
//!     .validate(Some(&json!({"age": 12})), &OptionsLayer::default())
//!     .await?
//!     .expect("age is invalid");
//! assert_eq!(report.field("age"), Some(&ErrorReport::message("must be an adult")));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod middleware;
pub mod predicate;
pub mod report;
pub mod schema;

pub use config::{
    ConfigError, ConfigManager, DEFAULT_REQUIRED_MESSAGE, DEFAULT_UNKNOWN_FIELD_MESSAGE,
    EnvProvider, IgnoreValueFn, OptionsLayer, SystemEnvProvider, ValidationOptions,
};
pub use error::{SchemaError, SchemaResult, ValidationError};
pub use field::{Name, Only, Optional, Required, name, only, only_with, optional, required};
pub use middleware::{Middleware, Modifier, Next, create_middleware};
pub use predicate::{Check, Predicate};
pub use report::ErrorReport;
pub use schema::{Entry, RawSchema, Schema, SchemaKind, Validate};
