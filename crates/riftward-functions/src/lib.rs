//! Riftward — safe functions.
//!
//! A safe function is a registered, validator-gated executable: the only
//! sanctioned path for generated content to mutate game state. This crate
//! holds the registry, the loose-payload coercion, and the per-turn rate
//! limited validator that sits in front of the registry.

pub mod payload;
pub mod registry;
pub mod validator;

pub use registry::{CallValidator, Executable, RegisteredFunction, SafeFunctionRegistry};
pub use validator::{FunctionCallValidator, RateLimits};
