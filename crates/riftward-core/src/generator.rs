//! Seams for the untrusted content generators.
//!
//! Generators receive a flat mapping of variables and return loosely-shaped
//! JSON. Nothing they return is trusted: every payload is re-parsed and
//! re-validated at the boundary that consumes it.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, GeneratorError};

/// Variables handed to a generator.
pub type Variables = serde_json::Map<String, Value>;

/// Which kind of content a generator call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorRole {
    /// Scene text plus player options.
    Event,
    /// Atmosphere and sensory text.
    World,
    /// Character reaction entries.
    Character,
    /// Consistency verdicts.
    Judge,
}

impl GeneratorRole {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::World => "world",
            Self::Character => "character",
            Self::Judge => "judge",
        }
    }
}

impl fmt::Display for GeneratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external content generator.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produces a payload for `role` from `variables`.
    async fn generate(
        &self,
        role: GeneratorRole,
        variables: &Variables,
    ) -> Result<Value, GeneratorError>;
}

/// What the judge is asked to assess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgeRequest {
    /// Scene, resolved choice, and proposed update in one line.
    pub summary: String,
    /// Current world-context text.
    pub world_context: String,
    /// Active flags.
    pub active_flags: Vec<String>,
    /// Active status effects, rendered as `target:status(duration)`.
    pub status_effects: Vec<String>,
}

impl JudgeRequest {
    /// Renders the request as generator variables.
    #[must_use]
    pub fn to_variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("summary".into(), Value::from(self.summary.clone()));
        vars.insert(
            "world_context".into(),
            Value::from(self.world_context.clone()),
        );
        vars.insert("active_flags".into(), Value::from(self.active_flags.clone()));
        vars.insert(
            "status_effects".into(),
            Value::from(self.status_effects.clone()),
        );
        vars
    }
}

/// The judge's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgeVerdict {
    /// Whether the update is consistent with the world.
    pub consistent: bool,
    /// Explanation.
    pub reason: String,
}

impl JudgeVerdict {
    /// Parses a raw judge payload.
    ///
    /// A payload without a boolean `consistent` field is treated as an
    /// inconsistent verdict so a misbehaving judge fails closed.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        match payload.get("consistent").and_then(Value::as_bool) {
            Some(consistent) => Self {
                consistent,
                reason: payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            },
            None => Self {
                consistent: false,
                reason: "malformed judge verdict".to_owned(),
            },
        }
    }
}

/// Tier 2 consistency judge.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Assesses a proposed update.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` when the underlying call cannot be
    /// completed; other failures should be folded into the verdict.
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_parses_consistent_payload() {
        let verdict = JudgeVerdict::from_payload(&json!({"consistent": true, "reason": "fits"}));
        assert!(verdict.consistent);
        assert_eq!(verdict.reason, "fits");
    }

    #[test]
    fn test_verdict_without_flag_fails_closed() {
        let verdict = JudgeVerdict::from_payload(&json!({"reason": "??"}));
        assert!(!verdict.consistent);
        let verdict = JudgeVerdict::from_payload(&json!({"consistent": "yes"}));
        assert!(!verdict.consistent);
    }

    #[test]
    fn test_request_variables_carry_every_field() {
        let request = JudgeRequest {
            summary: "s".into(),
            world_context: "w".into(),
            active_flags: vec!["a".into()],
            status_effects: vec![],
        };
        let vars = request.to_variables();
        assert_eq!(vars["summary"], "s");
        assert_eq!(vars["active_flags"], json!(["a"]));
        assert_eq!(vars["status_effects"], json!([]));
    }

    #[test]
    fn test_role_display_is_lowercase() {
        assert_eq!(GeneratorRole::Character.to_string(), "character");
    }
}
