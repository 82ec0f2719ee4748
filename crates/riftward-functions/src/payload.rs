//! Coercion of loosely-typed call payloads into [`FunctionCall`]s.

use riftward_core::call::{FunctionCall, Kwargs};
use riftward_core::error::ValidationError;
use serde_json::Value;

/// Parses a generator-supplied payload.
///
/// The payload must be an object with a string `name`. `args` must be a list,
/// `kwargs` and `metadata` must be objects; each may be absent or `null`, in
/// which case it defaults to empty. `arguments` is accepted as a spelling of
/// `kwargs` when `kwargs` itself is absent.
///
/// # Errors
///
/// Returns `ValidationError::Malformed` describing the first shape mismatch.
pub fn parse_payload(payload: &Value) -> Result<FunctionCall, ValidationError> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationError::Malformed(
            "payload must be an object".to_owned(),
        ));
    };

    let name = match object.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => {
            return Err(ValidationError::Malformed(
                "`name` must be a string".to_owned(),
            ));
        }
        None => return Err(ValidationError::Malformed("missing `name`".to_owned())),
    };

    let args = match object.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(ValidationError::Malformed(
                "`args` must be a list".to_owned(),
            ));
        }
    };

    let kwargs_value = object.get("kwargs").or_else(|| object.get("arguments"));
    let kwargs = mapping(kwargs_value, "kwargs")?;
    let metadata = mapping(object.get("metadata"), "metadata")?;

    FunctionCall::from_parts(name, args, kwargs, metadata)
}

fn mapping(value: Option<&Value>, field: &str) -> Result<Kwargs, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(Kwargs::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        Some(_) => Err(ValidationError::Malformed(format!(
            "`{field}` must be a mapping"
        ))),
    }
}

/// Parses a list of payloads, keeping successes and failures separately in
/// input order.
#[must_use]
pub fn parse_payload_list(value: &Value) -> Vec<Result<FunctionCall, ValidationError>> {
    match value {
        Value::Array(items) => items.iter().map(parse_payload).collect(),
        Value::Null => Vec::new(),
        other => vec![parse_payload(other)],
    }
}
