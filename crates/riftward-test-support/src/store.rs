//! Test stores — in-memory `StateStore` implementations for tests.

use std::sync::Mutex;

use riftward_core::error::StoreError;
use riftward_core::state::GameState;
use riftward_core::store::StateStore;

/// A state store backed by a mutex. Counts every `persist` call and can be
/// told to fail exactly one of them.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    state: Mutex<GameState>,
    persists: Mutex<usize>,
    fail_at: Option<usize>,
}

impl InMemoryStateStore {
    /// Create a store holding `state`.
    #[must_use]
    pub fn new(state: GameState) -> Self {
        Self {
            state: Mutex::new(state),
            persists: Mutex::new(0),
            fail_at: None,
        }
    }

    /// Create a store whose `nth` persist call (1-based) fails without
    /// writing. Every other call succeeds.
    #[must_use]
    pub fn failing_persist_at(state: GameState, nth: usize) -> Self {
        Self {
            fail_at: Some(nth),
            ..Self::new(state)
        }
    }

    /// Returns a copy of the stored state.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.state.lock().unwrap().clone()
    }

    /// Number of `persist` calls so far, failed ones included.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        *self.persists.lock().unwrap()
    }
}

impl StateStore for InMemoryStateStore {
    fn snapshot(&self) -> Result<GameState, StoreError> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn persist(&self, state: &GameState) -> Result<(), StoreError> {
        let mut persists = self.persists.lock().unwrap();
        *persists += 1;
        if self.fail_at == Some(*persists) {
            return Err(StoreError(format!("persist #{} refused", *persists)));
        }
        self.state.lock().unwrap().clone_from(state);
        Ok(())
    }
}

/// A state store that fails every operation.
#[derive(Debug)]
pub struct FailingStateStore;

impl StateStore for FailingStateStore {
    fn snapshot(&self) -> Result<GameState, StoreError> {
        Err(StoreError("snapshot unavailable".to_owned()))
    }

    fn persist(&self, _state: &GameState) -> Result<(), StoreError> {
        Err(StoreError("persist unavailable".to_owned()))
    }
}
