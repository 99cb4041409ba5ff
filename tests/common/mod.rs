//! Shared predicates and helpers for integration tests

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use validate_schema::{Predicate, RawSchema};

pub fn greater_than(n: i64) -> Predicate {
    Predicate::new(move |v| v.as_i64().is_some_and(|x| x > n))
}

pub fn even() -> Predicate {
    Predicate::new(|v| v.as_i64().is_some_and(|x| x % 2 == 0))
}

/// Resolves to `accepted` after `delay`
pub fn delayed(delay: Duration, accepted: bool) -> Predicate {
    Predicate::deferred(move |_: Value| async move {
        tokio::time::sleep(delay).await;
        Ok(accepted)
    })
}

/// `{"message": > 5, "message2": even}`, the first check deferred
pub fn two_checks() -> RawSchema {
    RawSchema::values([
        (
            "message",
            Predicate::deferred(|v: Value| async move { Ok(v.as_i64().is_some_and(|x| x > 5)) }),
        ),
        ("message2", even()),
    ])
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
