//! Error taxonomy for the turn engine.
//!
//! Errors are grouped by the boundary that raises them. Validation-family
//! errors are local to one proposed call or effect and the orchestrator
//! decides whether to substitute a fallback or abort; rollback and timeout
//! errors are fatal to the current turn.

use thiserror::Error;
use uuid::Uuid;

/// A proposed function call failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload did not have the shape of a function call.
    #[error("malformed call payload: {0}")]
    Malformed(String),

    /// No function with this name is registered.
    #[error("function not registered: {0}")]
    NotRegistered(String),

    /// Accepting the call would exceed a per-turn ceiling.
    #[error("rate limit exceeded for {name} ({scope} limit {limit})")]
    RateLimitExceeded {
        /// The function being called.
        name: String,
        /// Which counter tripped: `"global"` or `"function"`.
        scope: &'static str,
        /// The configured ceiling.
        limit: u32,
    },

    /// The function's own validator rejected the arguments.
    #[error("validator for {name} rejected call: {reason}")]
    Rejected {
        /// The function being called.
        name: String,
        /// Why the validator refused.
        reason: String,
    },

    /// A validator returned a call under a different name.
    #[error("validator for {expected} returned a call named {actual}")]
    NameMismatch {
        /// The name that was validated.
        expected: String,
        /// The name the validator returned.
        actual: String,
    },
}

impl ValidationError {
    /// Shorthand for a validator rejection.
    pub fn rejected(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Administrative registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A function with this name already exists.
    #[error("function already registered: {0}")]
    AlreadyRegistered(String),

    /// No function with this name exists.
    #[error("function not registered: {0}")]
    NotRegistered(String),

    /// The name is blank.
    #[error("function name must not be empty")]
    InvalidName,
}

/// Tier 1 (schema) rejection of a proposed reaction entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralValidationError {
    /// The entry itself is not a JSON object.
    #[error("reaction entry must be an object")]
    NotAnObject,

    /// A required text field is missing or not a string.
    #[error("field `{0}` must be a string")]
    MissingText(&'static str),

    /// The speech field exceeds its length cap.
    #[error("speech is {length} characters, limit is {limit}")]
    SpeechTooLong {
        /// Character count of the offending speech.
        length: usize,
        /// Configured cap.
        limit: usize,
    },

    /// `effects` is present but not an object.
    #[error("effects must be an object")]
    EffectsNotAMapping,

    /// `trust_delta` is not one of -1, 0, 1.
    #[error("trust_delta must be -1, 0 or 1")]
    TrustDeltaOutOfRange,

    /// A numeric delta field is not an integer.
    #[error("`{0}` must be an integer")]
    NotAnInteger(&'static str),

    /// `flag_set` is not a list of non-empty strings.
    #[error("flag_set must be a list of non-empty strings")]
    InvalidFlagSet,

    /// `item_change` is missing a key or carries a bad delta.
    #[error("invalid item_change: {0}")]
    InvalidItemChange(String),

    /// `status_change` is malformed.
    #[error("invalid status_change: {0}")]
    InvalidStatusChange(String),

    /// `status_change.duration` is negative.
    #[error("status_change duration must not be negative (got {0})")]
    NegativeDuration(i64),
}

/// Tier 2 rejection: the judge found the proposed update inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("judge rejected update from {character}: {reason}")]
pub struct SemanticValidationError {
    /// The character whose reaction was rejected.
    pub character: String,
    /// The judge's stated reason.
    pub reason: String,
}

/// Failure reading or writing the external state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("state store error: {0}")]
pub struct StoreError(pub String);

/// A safe-function executable failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

impl From<StoreError> for ExecutionError {
    fn from(err: StoreError) -> Self {
        Self(err.to_string())
    }
}

/// A generator collaborator failed to produce output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// The generator reported a failure.
    #[error("generator failed: {0}")]
    Failed(String),

    /// The generator is not available in this session.
    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

/// Checkpoint stack failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollbackError {
    /// A rollback was requested with an empty checkpoint stack.
    #[error("no checkpoint to roll back to")]
    NoCheckpoint,

    /// The requested checkpoint is not on the stack.
    #[error("checkpoint {0} not found")]
    CheckpointNotFound(Uuid),

    /// Snapshot or restore failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A call failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An administrative registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A reaction failed Tier 1.
    #[error(transparent)]
    Structural(#[from] StructuralValidationError),

    /// A reaction failed Tier 2.
    #[error(transparent)]
    Semantic(#[from] SemanticValidationError),

    /// The checkpoint stack could not satisfy a request.
    #[error(transparent)]
    Rollback(#[from] RollbackError),

    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A generator failed (non-timeout).
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// A safe-function executable failed.
    #[error("execution of {name} failed: {message}")]
    Execution {
        /// The function that failed.
        name: String,
        /// The executable's error message.
        message: String,
    },

    /// An external call timed out on every attempt.
    #[error("{role} generator timed out after {attempts} attempts")]
    Timeout {
        /// The generator role that timed out.
        role: String,
        /// How many attempts were made.
        attempts: u32,
    },
}

impl EngineError {
    /// Returns `true` for validation-family errors that are local to one call.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Structural(_)
                | Self::Semantic(_)
                | Self::Execution { .. }
                | Self::Generator(_)
        )
    }
}
