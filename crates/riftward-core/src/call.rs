//! The function-call value that flows through the safe-function pipeline.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;

/// Keyword arguments and metadata, ordered for deterministic comparison.
pub type Kwargs = BTreeMap<String, Value>;

/// A request to invoke a registered safe function.
///
/// The name is never empty and the argument containers are never absent.
/// Fields are private so a validated call cannot be mutated in place; the
/// `with_*` builders consume the call and return a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    name: String,
    args: Vec<Value>,
    kwargs: Kwargs,
    metadata: Kwargs,
}

impl FunctionCall {
    /// Creates a call with empty arguments.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Malformed` if `name` is blank.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_parts(name, Vec::new(), Kwargs::new(), Kwargs::new())
    }

    /// Creates a call from its components.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Malformed` if `name` is blank.
    pub fn from_parts(
        name: impl Into<String>,
        args: Vec<Value>,
        kwargs: Kwargs,
        metadata: Kwargs,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(ValidationError::Malformed(
                "function name must not be empty".to_owned(),
            ));
        }
        Ok(Self {
            name,
            args,
            kwargs,
            metadata,
        })
    }

    /// The registered function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments.
    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// Free-form metadata (source, turn, …).
    #[must_use]
    pub fn metadata(&self) -> &Kwargs {
        &self.metadata
    }

    /// Looks up a keyword argument.
    #[must_use]
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Looks up a keyword argument as a string slice.
    #[must_use]
    pub fn kwarg_str(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).and_then(Value::as_str)
    }

    /// Looks up a keyword argument as an integer.
    #[must_use]
    pub fn kwarg_i64(&self, key: &str) -> Option<i64> {
        self.kwargs.get(key).and_then(Value::as_i64)
    }

    /// Returns the call with an extra positional argument.
    #[must_use]
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Returns the call with a keyword argument set.
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Returns the call with a metadata entry set.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Decomposes the call into `(name, args, kwargs, metadata)`.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>, Kwargs, Kwargs) {
        (self.name, self.args, self.kwargs, self.metadata)
    }

    /// Renders the call back into the loose payload shape it was parsed from.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "args": self.args,
            "kwargs": self.kwargs,
            "metadata": self.metadata,
        })
    }
}
