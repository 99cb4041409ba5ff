//! Predicates
//!
//! Every predicate, synchronous or not, is normalized into a [`Check`] that
//! returns a boxed future, so the value validator has one code path. A
//! synchronous predicate resolves immediately.

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ValidationOptions;
use crate::error::{Result, ValidationError};

/// A leaf check: `true` means the value is accepted.
///
/// Arguments are `(value, containing_object, options)`.
pub trait Check: Send + Sync {
    fn check<'a>(
        &'a self,
        value: &'a Value,
        object: Option<&'a Value>,
        options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>>;
}

struct Plain<F>(F);

impl<F> Check for Plain<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn check<'a>(
        &'a self,
        value: &'a Value,
        _object: Option<&'a Value>,
        _options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        future::ready(Ok((self.0)(value))).boxed()
    }
}

struct Contextual<F>(F);

impl<F> Check for Contextual<F>
where
    F: Fn(&Value, Option<&Value>, &ValidationOptions) -> bool + Send + Sync,
{
    fn check<'a>(
        &'a self,
        value: &'a Value,
        object: Option<&'a Value>,
        options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        future::ready(Ok((self.0)(value, object, options))).boxed()
    }
}

struct Fallible<F>(F);

impl<F> Check for Fallible<F>
where
    F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync,
{
    fn check<'a>(
        &'a self,
        value: &'a Value,
        _object: Option<&'a Value>,
        _options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        future::ready((self.0)(value)).boxed()
    }
}

struct Deferred<F>(F);

impl<F, Fut> Check for Deferred<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    fn check<'a>(
        &'a self,
        value: &'a Value,
        _object: Option<&'a Value>,
        _options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        (self.0)(value.clone()).boxed()
    }
}

struct DeferredContextual<F>(F);

impl<F, Fut> Check for DeferredContextual<F>
where
    F: Fn(Value, Option<Value>, ValidationOptions) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    fn check<'a>(
        &'a self,
        value: &'a Value,
        object: Option<&'a Value>,
        options: &'a ValidationOptions,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        (self.0)(value.clone(), object.cloned(), options.clone()).boxed()
    }
}

/// A shareable predicate attached to one message of a value schema
#[derive(Clone)]
pub struct Predicate {
    check: Arc<dyn Check>,
    timeout: Option<Duration>,
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Predicate {
    /// Synchronous predicate over the value alone
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::from_check(Plain(f))
    }

    /// Synchronous predicate that also sees the containing object and options
    pub fn contextual<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&Value>, &ValidationOptions) -> bool + Send + Sync + 'static,
    {
        Self::from_check(Contextual(f))
    }

    /// Synchronous predicate that may fail operationally
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::from_check(Fallible(f))
    }

    /// Asynchronous predicate; receives its own copy of the value
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self::from_check(Deferred(f))
    }

    /// Asynchronous predicate with copies of the containing object and options
    pub fn deferred_contextual<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Option<Value>, ValidationOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self::from_check(DeferredContextual(f))
    }

    /// Wrap a hand-written [`Check`]
    pub fn from_check(check: impl Check + 'static) -> Self {
        Self {
            check: Arc::new(check),
            timeout: None,
        }
    }

    /// Fail the whole validation if this predicate takes longer than `timeout`.
    ///
    /// Requires a tokio runtime with the time driver enabled.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run the predicate, attributing operational failures to `message`
    pub(crate) async fn evaluate(
        &self,
        message: &str,
        value: &Value,
        object: Option<&Value>,
        options: &ValidationOptions,
    ) -> Result<bool> {
        let check = self.check.check(value, object, options);

        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, check).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        predicate = message,
                        timeout_ms = timeout.as_millis() as u64,
                        "predicate timed out"
                    );
                    return Err(ValidationError::Timeout {
                        message: message.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => check.await,
        };

        outcome.map_err(|source| {
            tracing::warn!(predicate = message, error = %source, "predicate failed");
            ValidationError::Predicate {
                message: message.to_string(),
                source,
            }
        })
    }
}
