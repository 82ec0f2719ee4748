//! State store abstraction.

use crate::error::StoreError;
use crate::state::GameState;

/// External owner of the persisted game state.
///
/// Both operations must be atomic with respect to other sessions. The engine
/// works copy-in/copy-out: it takes a snapshot, mutates the copy, and
/// persists a full replacement.
pub trait StateStore: Send + Sync {
    /// Returns a deep copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the state cannot be read.
    fn snapshot(&self) -> Result<GameState, StoreError>;

    /// Durably replaces the current state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the state cannot be written.
    fn persist(&self, state: &GameState) -> Result<(), StoreError>;
}

/// Reads the state, applies `mutate`, and persists the result.
///
/// # Errors
///
/// Returns `StoreError` if reading or writing fails.
pub fn update_state<T>(
    store: &dyn StateStore,
    mutate: impl FnOnce(&mut GameState) -> T,
) -> Result<T, StoreError> {
    let mut state = store.snapshot()?;
    let out = mutate(&mut state);
    store.persist(&state)?;
    Ok(out)
}
