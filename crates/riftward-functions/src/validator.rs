//! Payload validation with per-turn rate limits.

use std::collections::BTreeMap;

use riftward_core::call::FunctionCall;
use riftward_core::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::payload::parse_payload;
use crate::registry::SafeFunctionRegistry;

/// Per-turn call ceilings. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Ceiling across all functions.
    pub global_per_turn: Option<u32>,
    /// Ceilings for individual functions.
    pub per_function: BTreeMap<String, u32>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            global_per_turn: Some(12),
            per_function: BTreeMap::from([
                ("change_weather".to_owned(), 2),
                ("adjust_metric".to_owned(), 6),
            ]),
        }
    }
}

impl RateLimits {
    /// No ceilings at all.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            global_per_turn: None,
            per_function: BTreeMap::new(),
        }
    }
}

/// Turns raw payloads into validated calls and enforces per-turn limits.
///
/// The validator owns the registry it delegates to, so administrative
/// changes go through [`FunctionCallValidator::registry_mut`].
#[derive(Debug, Clone)]
pub struct FunctionCallValidator {
    registry: SafeFunctionRegistry,
    limits: RateLimits,
    global_count: u32,
    counts: BTreeMap<String, u32>,
}

impl FunctionCallValidator {
    /// Creates a validator in front of `registry`.
    #[must_use]
    pub fn new(registry: SafeFunctionRegistry, limits: RateLimits) -> Self {
        Self {
            registry,
            limits,
            global_count: 0,
            counts: BTreeMap::new(),
        }
    }

    /// The registry this validator delegates to.
    #[must_use]
    pub fn registry(&self) -> &SafeFunctionRegistry {
        &self.registry
    }

    /// Mutable access for administrative registration changes.
    pub fn registry_mut(&mut self) -> &mut SafeFunctionRegistry {
        &mut self.registry
    }

    /// Configured limits.
    #[must_use]
    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Clears the per-turn counters. Called once at the start of each turn.
    pub fn reset(&mut self) {
        self.global_count = 0;
        self.counts.clear();
    }

    /// Calls accepted so far this turn.
    #[must_use]
    pub fn calls_this_turn(&self) -> u32 {
        self.global_count
    }

    /// Calls to `name` accepted so far this turn.
    #[must_use]
    pub fn count_for(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Coerces a loose payload into a validated call.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Malformed` on a shape mismatch,
    /// `NotRegistered` for unknown functions, `RateLimitExceeded` when a
    /// ceiling would be exceeded, and whatever the function's own validator
    /// reports.
    pub fn validate(&mut self, payload: &Value) -> Result<FunctionCall, ValidationError> {
        let call = parse_payload(payload)?;
        self.validate_call(call)
    }

    /// Validates an already-parsed call. On success the call is counted
    /// against this turn's limits.
    ///
    /// # Errors
    ///
    /// As [`FunctionCallValidator::validate`], minus shape errors.
    pub fn validate_call(&mut self, call: FunctionCall) -> Result<FunctionCall, ValidationError> {
        let name = call.name().to_owned();
        if !self.registry.contains(&name) {
            return Err(ValidationError::NotRegistered(name));
        }
        self.check_limits(&name)?;

        let validated = self.registry.validate(call)?;
        self.global_count += 1;
        *self.counts.entry(name.clone()).or_insert(0) += 1;
        debug!(
            function = %name,
            global = self.global_count,
            "call validated"
        );
        Ok(validated)
    }

    /// Un-counts a call that was validated but later rolled back, so a
    /// retried turn is not double-penalized.
    pub fn revert_record(&mut self, name: &str) {
        self.global_count = self.global_count.saturating_sub(1);
        if let Some(count) = self.counts.get_mut(name) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.remove(name);
            }
        }
        debug!(function = name, global = self.global_count, "call record reverted");
    }

    fn check_limits(&self, name: &str) -> Result<(), ValidationError> {
        if let Some(limit) = self.limits.global_per_turn {
            if self.global_count >= limit {
                warn!(function = name, limit, "global rate limit reached");
                return Err(ValidationError::RateLimitExceeded {
                    name: name.to_owned(),
                    scope: "global",
                    limit,
                });
            }
        }
        if let Some(&limit) = self.limits.per_function.get(name) {
            if self.count_for(name) >= limit {
                warn!(function = name, limit, "function rate limit reached");
                return Err(ValidationError::RateLimitExceeded {
                    name: name.to_owned(),
                    scope: "function",
                    limit,
                });
            }
        }
        Ok(())
    }
}
