//! Test generators — scripted `Generator` and `Judge` implementations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use riftward_core::error::{EngineError, GeneratorError};
use riftward_core::generator::{
    Generator, GeneratorRole, Judge, JudgeRequest, JudgeVerdict, Variables,
};
use serde_json::Value;

/// A generator that replays fixed payloads per role; unscripted roles report
/// `Unavailable`. Records every call.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: BTreeMap<String, Value>,
    calls: Mutex<Vec<(GeneratorRole, Variables)>>,
}

impl ScriptedGenerator {
    /// Create a generator with no scripted output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the payload returned for `role`.
    #[must_use]
    pub fn with(mut self, role: GeneratorRole, payload: Value) -> Self {
        self.responses.insert(role.as_str().to_owned(), payload);
        self
    }

    /// Returns a snapshot of every call made.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<(GeneratorRole, Variables)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made for `role`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls_for(&self, role: GeneratorRole) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == role)
            .count()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        role: GeneratorRole,
        variables: &Variables,
    ) -> Result<Value, GeneratorError> {
        self.calls.lock().unwrap().push((role, variables.clone()));
        self.responses
            .get(role.as_str())
            .cloned()
            .ok_or_else(|| GeneratorError::Unavailable(format!("nothing scripted for {role}")))
    }
}

/// A generator that fails every call.
#[derive(Debug)]
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(
        &self,
        role: GeneratorRole,
        _variables: &Variables,
    ) -> Result<Value, GeneratorError> {
        Err(GeneratorError::Failed(format!("{role} generator is down")))
    }
}

/// A generator that never answers for one role and delegates the rest.
/// Counts stalled attempts.
#[derive(Debug)]
pub struct StallingGenerator {
    stalled: GeneratorRole,
    inner: ScriptedGenerator,
    attempts: Mutex<u32>,
}

impl StallingGenerator {
    /// Stalls on `role`, answering other roles from `inner`.
    #[must_use]
    pub fn new(stalled: GeneratorRole, inner: ScriptedGenerator) -> Self {
        Self {
            stalled,
            inner,
            attempts: Mutex::new(0),
        }
    }

    /// Number of stalled attempts so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Generator for StallingGenerator {
    async fn generate(
        &self,
        role: GeneratorRole,
        variables: &Variables,
    ) -> Result<Value, GeneratorError> {
        if role != self.stalled {
            return self.inner.generate(role, variables).await;
        }
        *self.attempts.lock().unwrap() += 1;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

/// A judge that approves everything except reactions from named characters.
/// Records every request.
#[derive(Debug, Default)]
pub struct FixedJudge {
    vetoed: BTreeSet<String>,
    timeout: bool,
    requests: Mutex<Vec<JudgeRequest>>,
}

impl FixedJudge {
    /// A judge that approves every update.
    #[must_use]
    pub fn approving() -> Self {
        Self::default()
    }

    /// A judge that vetoes updates from the given characters.
    #[must_use]
    pub fn vetoing<'a>(characters: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            vetoed: characters.into_iter().map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    /// A judge whose every call times out.
    #[must_use]
    pub fn timing_out() -> Self {
        Self {
            timeout: true,
            ..Self::default()
        }
    }

    /// Returns a snapshot of every request received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<JudgeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Judge for FixedJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, EngineError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.timeout {
            return Err(EngineError::Timeout {
                role: GeneratorRole::Judge.to_string(),
                attempts: 1,
            });
        }
        let vetoed = self
            .vetoed
            .iter()
            .find(|name| request.summary.starts_with(&format!("{name}:")));
        Ok(match vetoed {
            Some(name) => JudgeVerdict {
                consistent: false,
                reason: format!("{name} would not do that"),
            },
            None => JudgeVerdict {
                consistent: true,
                reason: "consistent".to_owned(),
            },
        })
    }
}
