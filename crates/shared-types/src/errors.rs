//! # Error Types
//!
//! Defines error types used across subsystems.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors from parsing a hex-string identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexStringError {
    #[error("expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("must be lowercase hexadecimal")]
    NotLowercaseHex,
}

/// Key used for failures that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Structural validation failure keyed by field path.
///
/// Paths are dot-separated (`message.node.addresses`), matching the JSON
/// shape of the offending value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Single error for one field.
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::default();
        error.push(path, message);
        error
    }

    /// Error not attributable to one field.
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(path.into())
            .or_default()
            .push(message.into());
    }

    /// Append every error of `other`.
    pub fn merge(&mut self, other: ValidationError) {
        for (path, messages) in other.errors {
            self.errors.entry(path).or_default().extend(messages);
        }
    }

    /// Prefix every path with `parent.` (used when validating nested values).
    pub fn nested(self, parent: &str) -> Self {
        let errors = self
            .errors
            .into_iter()
            .map(|(path, messages)| {
                let path = if path == NON_FIELD_ERRORS {
                    parent.to_owned()
                } else {
                    format!("{parent}.{path}")
                };
                (path, messages)
            })
            .collect();
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ok when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// JSON body for an API client error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self.errors)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (path, messages) in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", path, messages.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_prefixes_paths() {
        let error = ValidationError::field("addresses", "required").nested("node");
        assert!(error.errors().contains_key("node.addresses"));
    }

    #[test]
    fn test_nested_non_field_becomes_parent() {
        let error = ValidationError::non_field("bad").nested("message");
        assert_eq!(error.errors()["message"], vec!["bad".to_string()]);
    }

    #[test]
    fn test_json_shape() {
        let error = ValidationError::field("message.type", "Invalid value.");
        assert_eq!(
            error.to_json(),
            serde_json::json!({"message.type": ["Invalid value."]})
        );
    }

    #[test]
    fn test_empty_into_result() {
        assert!(ValidationError::default().into_result().is_ok());
    }
}
