//! Name → (executable, validator) catalog.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use riftward_core::call::FunctionCall;
use riftward_core::error::{EngineError, ExecutionError, RegistryError, ValidationError};
use serde_json::Value;
use tracing::{debug, info};

/// A safe-function body. Receives the sanitized call.
pub type Executable = Arc<dyn Fn(&FunctionCall) -> Result<Value, ExecutionError> + Send + Sync>;

/// A validator that may sanitize a call's arguments or reject it.
pub type CallValidator =
    Arc<dyn Fn(FunctionCall) -> Result<FunctionCall, ValidationError> + Send + Sync>;

/// One registry entry.
#[derive(Clone)]
pub struct RegisteredFunction {
    name: String,
    executable: Executable,
    validator: CallValidator,
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RegisteredFunction {
    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the validator and checks it kept the call's name.
    ///
    /// # Errors
    ///
    /// Returns the validator's own error, or `ValidationError::NameMismatch`
    /// if the validator renamed the call.
    pub fn validate(&self, call: FunctionCall) -> Result<FunctionCall, ValidationError> {
        let validated = (self.validator)(call)?;
        if validated.name() != self.name {
            return Err(ValidationError::NameMismatch {
                expected: self.name.clone(),
                actual: validated.name().to_owned(),
            });
        }
        Ok(validated)
    }

    /// Invokes the executable.
    ///
    /// # Errors
    ///
    /// Returns whatever the executable reports.
    pub fn execute(&self, call: &FunctionCall) -> Result<Value, ExecutionError> {
        (self.executable)(call)
    }
}

/// Catalog of safe functions, unique by name.
#[derive(Debug, Clone, Default)]
pub struct SafeFunctionRegistry {
    functions: BTreeMap<String, RegisteredFunction>,
}

impl SafeFunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `executable` under `name` with a pass-through validator.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyRegistered` on a duplicate name and
    /// `RegistryError::InvalidName` on a blank one.
    pub fn register<E>(&mut self, name: &str, executable: E) -> Result<(), RegistryError>
    where
        E: Fn(&FunctionCall) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    {
        self.register_with_validator(name, executable, Ok)
    }

    /// Registers `executable` under `name`, gated by `validator`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyRegistered` on a duplicate name and
    /// `RegistryError::InvalidName` on a blank one.
    pub fn register_with_validator<E, V>(
        &mut self,
        name: &str,
        executable: E,
        validator: V,
    ) -> Result<(), RegistryError>
    where
        E: Fn(&FunctionCall) -> Result<Value, ExecutionError> + Send + Sync + 'static,
        V: Fn(FunctionCall) -> Result<FunctionCall, ValidationError> + Send + Sync + 'static,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }
        if self.functions.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_owned()));
        }
        self.functions.insert(
            name.to_owned(),
            RegisteredFunction {
                name: name.to_owned(),
                executable: Arc::new(executable),
                validator: Arc::new(validator),
            },
        );
        info!(function = name, "safe function registered");
        Ok(())
    }

    /// Removes `name`. Returns whether it was present; absent names are a
    /// no-op.
    pub fn unregister(&mut self, name: &str) -> bool {
        let removed = self.functions.remove(name).is_some();
        if removed {
            info!(function = name, "safe function unregistered");
        }
        removed
    }

    /// Looks up an entry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotRegistered` for unknown names.
    pub fn get(&self, name: &str) -> Result<&RegisteredFunction, RegistryError> {
        self.functions
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_owned()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Runs the registered validator for `call`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NotRegistered` for unknown names, otherwise
    /// whatever the validator reports.
    pub fn validate(&self, call: FunctionCall) -> Result<FunctionCall, ValidationError> {
        let entry = self
            .functions
            .get(call.name())
            .ok_or_else(|| ValidationError::NotRegistered(call.name().to_owned()))?;
        entry.validate(call)
    }

    /// Validates then executes `call`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` if validation fails and
    /// `EngineError::Execution` if the executable fails.
    pub fn call(&self, call: FunctionCall) -> Result<Value, EngineError> {
        let call = self.validate(call)?;
        self.execute(&call)
    }

    /// Builds a call from `name` and keyword arguments, then validates and
    /// executes it.
    ///
    /// # Errors
    ///
    /// As [`SafeFunctionRegistry::call`].
    pub fn call_by_name<I, K>(&self, name: &str, kwargs: I) -> Result<Value, EngineError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let call = kwargs
            .into_iter()
            .fold(FunctionCall::new(name)?, |call, (key, value)| {
                call.with_kwarg(key, value)
            });
        self.call(call)
    }

    /// Executes an already-validated call without re-validating.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` for unknown names and
    /// `EngineError::Execution` if the executable fails.
    pub fn execute(&self, call: &FunctionCall) -> Result<Value, EngineError> {
        let entry = self
            .functions
            .get(call.name())
            .ok_or_else(|| ValidationError::NotRegistered(call.name().to_owned()))?;
        debug!(function = call.name(), "executing safe function");
        entry.execute(call).map_err(|err| EngineError::Execution {
            name: call.name().to_owned(),
            message: err.0,
        })
    }
}
