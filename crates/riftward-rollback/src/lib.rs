//! Riftward — checkpoint/rollback.
//!
//! Checkpoints are whole-state deep copies taken through an injected snapshot
//! provider and restored through an injected callback. The stack is bounded:
//! once full, pushing evicts the oldest checkpoint without restoring it.
//!
//! ```text
//! empty ──create──▶ has-checkpoints ──rollback──▶ rolled-back
//!                          │
//!                          └──commit──▶ committed (empty)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use riftward_core::call::{FunctionCall, Kwargs};
use riftward_core::clock::Clock;
use riftward_core::error::{EngineError, RollbackError, StoreError};
use riftward_core::state::GameState;
use riftward_core::store::StateStore;
use riftward_functions::FunctionCallValidator;
use riftward_functions::payload::parse_payload;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Produces a deep copy of the current state.
pub type SnapshotProvider<S> = Box<dyn Fn() -> Result<S, StoreError> + Send + Sync>;

/// Replaces the current state with a snapshot.
pub type RestoreCallback<S> = Box<dyn Fn(&S) -> Result<(), StoreError> + Send + Sync>;

/// A restorable snapshot.
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    id: Uuid,
    snapshot: S,
    metadata: Kwargs,
    call: Option<FunctionCall>,
    created_at: DateTime<Utc>,
}

impl<S> Checkpoint<S> {
    /// Checkpoint identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The captured state.
    #[must_use]
    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    /// Metadata supplied at creation.
    #[must_use]
    pub fn metadata(&self) -> &Kwargs {
        &self.metadata
    }

    /// The call that prompted the checkpoint, if any.
    #[must_use]
    pub fn call(&self) -> Option<&FunctionCall> {
        self.call.as_ref()
    }

    /// When the checkpoint was taken.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Bounded LIFO stack of checkpoints over an injected snapshot/restore pair.
pub struct RollbackSystem<S> {
    provider: SnapshotProvider<S>,
    restore: RestoreCallback<S>,
    stack: VecDeque<Checkpoint<S>>,
    max_checkpoints: usize,
    clock: Arc<dyn Clock>,
}

impl<S> fmt::Debug for RollbackSystem<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackSystem")
            .field("depth", &self.stack.len())
            .field("max_checkpoints", &self.max_checkpoints)
            .finish_non_exhaustive()
    }
}

impl RollbackSystem<GameState> {
    /// A rollback system over a [`StateStore`].
    #[must_use]
    pub fn for_store(
        store: Arc<dyn StateStore>,
        max_checkpoints: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reader = Arc::clone(&store);
        Self::new(
            Box::new(move || reader.snapshot()),
            Box::new(move |state| store.persist(state)),
            max_checkpoints,
            clock,
        )
    }
}

impl<S> RollbackSystem<S> {
    /// Creates an empty stack holding at most `max_checkpoints` entries
    /// (at least one).
    #[must_use]
    pub fn new(
        provider: SnapshotProvider<S>,
        restore: RestoreCallback<S>,
        max_checkpoints: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            restore,
            stack: VecDeque::new(),
            max_checkpoints: max_checkpoints.max(1),
            clock,
        }
    }

    /// Number of checkpoints held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub fn max_checkpoints(&self) -> usize {
        self.max_checkpoints
    }

    /// The most recent checkpoint.
    #[must_use]
    pub fn latest(&self) -> Option<&Checkpoint<S>> {
        self.stack.back()
    }

    /// Checkpoints from oldest to newest.
    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint<S>> {
        self.stack.iter()
    }

    /// Snapshots the current state and pushes it.
    ///
    /// # Errors
    ///
    /// Returns `RollbackError::Store` if the snapshot cannot be taken.
    pub fn create_checkpoint(
        &mut self,
        metadata: Kwargs,
        call: Option<FunctionCall>,
    ) -> Result<Uuid, RollbackError> {
        let snapshot = (self.provider)()?;
        let checkpoint = Checkpoint {
            id: Uuid::new_v4(),
            snapshot,
            metadata,
            call,
            created_at: self.clock.now(),
        };
        let id = checkpoint.id;

        if self.stack.len() >= self.max_checkpoints {
            if let Some(evicted) = self.stack.pop_front() {
                debug!(checkpoint = %evicted.id, "evicted oldest checkpoint");
            }
        }
        self.stack.push_back(checkpoint);
        debug!(checkpoint = %id, depth = self.stack.len(), "checkpoint created");
        Ok(id)
    }

    /// Pops the latest checkpoint and restores it.
    ///
    /// # Errors
    ///
    /// Returns `RollbackError::NoCheckpoint` if the stack is empty, or
    /// `RollbackError::Store` if the restore fails.
    pub fn rollback(&mut self, reason: &str) -> Result<Checkpoint<S>, RollbackError> {
        let checkpoint = self.stack.pop_back().ok_or(RollbackError::NoCheckpoint)?;
        (self.restore)(&checkpoint.snapshot)?;
        warn!(checkpoint = %checkpoint.id, reason, "rolled back to checkpoint");
        Ok(checkpoint)
    }

    /// Pops down to and including checkpoint `id`, then restores it.
    ///
    /// # Errors
    ///
    /// Returns `RollbackError::NoCheckpoint` if the stack is empty,
    /// `RollbackError::CheckpointNotFound` if `id` is not on the stack, or
    /// `RollbackError::Store` if the restore fails.
    pub fn rollback_to(&mut self, id: Uuid) -> Result<Checkpoint<S>, RollbackError> {
        if self.stack.is_empty() {
            return Err(RollbackError::NoCheckpoint);
        }
        let position = self
            .stack
            .iter()
            .position(|checkpoint| checkpoint.id == id)
            .ok_or(RollbackError::CheckpointNotFound(id))?;

        let discarded = self.stack.len() - position - 1;
        self.stack.truncate(position + 1);
        let checkpoint = self.stack.pop_back().ok_or(RollbackError::NoCheckpoint)?;
        (self.restore)(&checkpoint.snapshot)?;
        warn!(checkpoint = %id, discarded, "rolled back to named checkpoint");
        Ok(checkpoint)
    }

    /// Pops the latest checkpoint without restoring it.
    pub fn discard_latest(&mut self) -> Option<Checkpoint<S>> {
        self.stack.pop_back()
    }

    /// Drops every checkpoint; the current state becomes final.
    pub fn commit(&mut self) {
        let dropped = self.stack.len();
        self.stack.clear();
        debug!(dropped, "checkpoints committed");
    }

    /// Runs `body` inside a checkpoint.
    ///
    /// On failure the state is rolled back and the failure propagated. On
    /// success the checkpoint is left on the stack for the caller to commit,
    /// discard, or roll back later.
    ///
    /// # Errors
    ///
    /// Returns `body`'s error after rolling back, or a `RollbackError`
    /// (converted into `E`) if checkpointing or restoring fails.
    pub fn transaction<T, E, F>(&mut self, metadata: Kwargs, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RollbackError> + fmt::Display,
    {
        self.create_checkpoint(metadata, None)?;
        match body() {
            Ok(value) => Ok(value),
            Err(err) => {
                let reason = err.to_string();
                self.rollback(&reason)?;
                Err(err)
            }
        }
    }

    /// Validates `payload`, checkpoints, and executes it.
    ///
    /// On failure the validator's counters are reverted and the state is
    /// rolled back before the error is returned. On success the checkpoint is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Validation` if the payload is rejected,
    /// `EngineError::Execution` if the executable fails, or
    /// `EngineError::Rollback` if checkpointing or restoring fails.
    pub fn run_validated_call(
        &mut self,
        validator: &mut FunctionCallValidator,
        payload: &Value,
        metadata: Kwargs,
    ) -> Result<(FunctionCall, Value), EngineError> {
        let call = parse_payload(payload)?;
        self.run_call(validator, call, metadata)
    }

    /// As [`RollbackSystem::run_validated_call`] for an already-parsed call.
    ///
    /// # Errors
    ///
    /// As [`RollbackSystem::run_validated_call`].
    pub fn run_call(
        &mut self,
        validator: &mut FunctionCallValidator,
        call: FunctionCall,
        metadata: Kwargs,
    ) -> Result<(FunctionCall, Value), EngineError> {
        let call = validator.validate_call(call)?;
        let name = call.name().to_owned();

        if let Err(err) = self.create_checkpoint(metadata, Some(call.clone())) {
            validator.revert_record(&name);
            return Err(err.into());
        }

        match validator.registry().execute(&call) {
            Ok(result) => {
                self.discard_latest();
                info!(function = %name, "safe function executed");
                Ok((call, result))
            }
            Err(err) => {
                validator.revert_record(&name);
                self.rollback(&err.to_string())?;
                Err(err)
            }
        }
    }
}
