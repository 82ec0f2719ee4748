//! Bounded-timeout access to the external generators.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use riftward_core::error::EngineError;
use riftward_core::generator::{
    Generator, GeneratorRole, Judge, JudgeRequest, JudgeVerdict, Variables,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Wraps a generator with a per-attempt timeout and limited retries.
///
/// Only timeouts are retried. A generator that answers with an error is not
/// asked again; the caller substitutes scripted content instead.
#[derive(Clone)]
pub struct GeneratorGateway {
    generator: Arc<dyn Generator>,
    timeout: Duration,
    retries: u32,
}

impl fmt::Debug for GeneratorGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorGateway")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl GeneratorGateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration, retries: u32) -> Self {
        Self {
            generator,
            timeout,
            retries,
        }
    }

    /// Calls the generator for `role`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` once every attempt has timed out, and
    /// `EngineError::Generator` if the generator reports a failure.
    pub async fn generate(
        &self,
        role: GeneratorRole,
        variables: &Variables,
    ) -> Result<Value, EngineError> {
        let attempts = self.retries + 1;
        for attempt in 1..=attempts {
            match tokio::time::timeout(self.timeout, self.generator.generate(role, variables)).await
            {
                Ok(Ok(payload)) => {
                    debug!(%role, attempt, "generator answered");
                    return Ok(payload);
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => warn!(%role, attempt, attempts, "generator timed out"),
            }
        }
        Err(EngineError::Timeout {
            role: role.to_string(),
            attempts,
        })
    }
}

/// A judge backed by the generator's `judge` role.
#[derive(Debug, Clone)]
pub struct GeneratorJudge {
    gateway: GeneratorGateway,
}

impl GeneratorJudge {
    /// Creates a judge that asks `gateway`.
    #[must_use]
    pub fn new(gateway: GeneratorGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Judge for GeneratorJudge {
    async fn judge(&self, request: &JudgeRequest) -> Result<JudgeVerdict, EngineError> {
        match self
            .gateway
            .generate(GeneratorRole::Judge, &request.to_variables())
            .await
        {
            Ok(payload) => Ok(JudgeVerdict::from_payload(&payload)),
            Err(EngineError::Generator(err)) => {
                warn!(error = %err, "judge unavailable, rejecting update");
                Ok(JudgeVerdict {
                    consistent: false,
                    reason: format!("judge unavailable: {err}"),
                })
            }
            Err(err) => Err(err),
        }
    }
}
