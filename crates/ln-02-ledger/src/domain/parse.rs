//! Field-path aware decoding of JSON envelopes.
//!
//! Every error is recorded under the dotted path of the offending field so
//! API clients get `{"message.node.fee": ["..."]}` style responses.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared_types::{Type, ValidationError};

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const INVALID: &str = "Invalid value.";

pub(crate) fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_owned()
    } else {
        format!("{path}.{field}")
    }
}

pub(crate) fn object<'a>(
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| {
        let message = "Invalid data. Expected a dictionary.";
        if path.is_empty() {
            ValidationError::non_field(message)
        } else {
            ValidationError::field(path, message)
        }
    })
}

/// Decode `object[name]`, recording a missing or malformed field.
pub(crate) fn field<T: DeserializeOwned>(
    object: &Map<String, Value>,
    path: &str,
    name: &str,
    errors: &mut ValidationError,
) -> Option<T> {
    let Some(value) = object.get(name) else {
        errors.push(join(path, name), REQUIRED);
        return None;
    };
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            errors.push(join(path, name), err.to_string());
            None
        }
    }
}

/// Read the `type` tag.
pub(crate) fn type_tag(
    object: &Map<String, Value>,
    path: &str,
    errors: &mut ValidationError,
) -> Option<Type> {
    let Some(value) = object.get("type") else {
        errors.push(join(path, "type"), REQUIRED);
        return None;
    };
    let tag = value.as_u64().and_then(|tag| Type::try_from(tag).ok());
    if tag.is_none() {
        errors.push(join(path, "type"), INVALID);
    }
    tag
}

/// Record every key not in `allowed`.
pub(crate) fn reject_unknown(
    object: &Map<String, Value>,
    path: &str,
    allowed: &[&str],
    errors: &mut ValidationError,
) {
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.push(join(path, key), "Extra fields not permitted.");
        }
    }
}
