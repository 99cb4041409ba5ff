//! Error Reports
//!
//! The data produced by a validation run. A report is either a flat list of
//! messages (leaf values) or a mapping from field name to a nested report
//! (objects). "No errors" is represented by `None` at every level, never by an
//! empty report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structured result of a failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorReport {
    /// Messages for a single value, in declaration order
    Messages(Vec<String>),
    /// Reports for the failing fields of an object
    Fields(BTreeMap<String, ErrorReport>),
}

impl ErrorReport {
    /// Single-message report
    pub fn message(message: impl Into<String>) -> Self {
        ErrorReport::Messages(vec![message.into()])
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ErrorReport::Messages(messages) => messages.is_empty(),
            ErrorReport::Fields(fields) => fields.is_empty(),
        }
    }

    /// `None` for an empty report
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }

    pub fn as_messages(&self) -> Option<&[String]> {
        match self {
            ErrorReport::Messages(messages) => Some(messages),
            ErrorReport::Fields(_) => None,
        }
    }

    pub fn as_fields(&self) -> Option<&BTreeMap<String, ErrorReport>> {
        match self {
            ErrorReport::Messages(_) => None,
            ErrorReport::Fields(fields) => Some(fields),
        }
    }

    /// Report for a nested field, following a dotted path
    pub fn field(&self, path: &str) -> Option<&ErrorReport> {
        path.split('.').try_fold(self, |report, segment| {
            report.as_fields().and_then(|fields| fields.get(segment))
        })
    }

    /// Total number of messages at every depth
    pub fn message_count(&self) -> usize {
        match self {
            ErrorReport::Messages(messages) => messages.len(),
            ErrorReport::Fields(fields) => fields.values().map(Self::message_count).sum(),
        }
    }

    /// Flatten into `(path, message)` pairs; top-level messages have an empty path
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.message_count());
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            ErrorReport::Messages(messages) => {
                out.extend(messages.iter().map(|m| (prefix.to_string(), m.clone())));
            }
            ErrorReport::Fields(fields) => {
                for (field, report) in fields {
                    let path = if prefix.is_empty() {
                        field.clone()
                    } else {
                        format!("{}.{}", prefix, field)
                    };
                    report.flatten_into(&path, out);
                }
            }
        }
    }
}

impl From<Vec<String>> for ErrorReport {
    fn from(messages: Vec<String>) -> Self {
        ErrorReport::Messages(messages)
    }
}

impl From<BTreeMap<String, ErrorReport>> for ErrorReport {
    fn from(fields: BTreeMap<String, ErrorReport>) -> Self {
        ErrorReport::Fields(fields)
    }
}

/// One line per message, `path: message` for nested fields
impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (path, message)) in self.flatten().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            if path.is_empty() {
                write!(f, "{}", message)?;
            } else {
                write!(f, "{}: {}", path, message)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> ErrorReport {
        ErrorReport::Fields(BTreeMap::from([
            ("name".to_string(), ErrorReport::message("is required")),
            (
                "address".to_string(),
                ErrorReport::Fields(BTreeMap::from([(
                    "zip".to_string(),
                    ErrorReport::Messages(vec!["too short".into(), "not numeric".into()]),
                )])),
            ),
        ]))
    }

    #[test]
    fn test_serializes_like_plain_json() {
        let value = serde_json::to_value(nested()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": ["is required"],
                "address": {"zip": ["too short", "not numeric"]}
            })
        );

        let back: ErrorReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, nested());
    }

    #[test]
    fn test_field_lookup() {
        let report = nested();
        assert_eq!(
            report.field("address.zip").and_then(ErrorReport::as_messages),
            Some(&["too short".to_string(), "not numeric".to_string()][..])
        );
        assert!(report.field("address.street").is_none());
        assert!(report.field("name.first").is_none());
    }

    #[test]
    fn test_flatten_and_display() {
        let report = nested();
        assert_eq!(report.message_count(), 3);
        assert_eq!(
            report.to_string(),
            "address.zip: too short\naddress.zip: not numeric\nname: is required"
        );

        let flat = ErrorReport::Messages(vec!["a".into(), "b".into()]);
        assert_eq!(flat.to_string(), "a\nb");
    }

    #[test]
    fn test_non_empty() {
        assert!(ErrorReport::Messages(vec![]).non_empty().is_none());
        assert!(ErrorReport::Fields(BTreeMap::new()).non_empty().is_none());
        assert!(ErrorReport::message("x").non_empty().is_some());
    }
}
