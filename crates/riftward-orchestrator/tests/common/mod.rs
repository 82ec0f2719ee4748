//! Shared helpers for orchestrator integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use riftward_core::clock::Clock;
use riftward_core::state::{GameState, metric};
use riftward_core::store::StateStore;
use riftward_orchestrator::{OrchestratorConfig, TurnOrchestrator};
use riftward_test_support::{FixedClock, InMemoryStateStore};

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// A config with fast generator timeouts and no retries.
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        seed: 42,
        generator_timeout_ms: 20,
        generator_retries: 0,
        ..OrchestratorConfig::default()
    }
}

/// Build an orchestrator over `store` with a fixed clock.
pub fn build_orchestrator(
    config: OrchestratorConfig,
    store: &Arc<InMemoryStateStore>,
) -> TurnOrchestrator {
    TurnOrchestrator::new(
        config,
        Arc::clone(store) as Arc<dyn StateStore>,
        fixed_clock(),
    )
    .unwrap()
}

/// A fresh session in an in-memory store.
pub fn new_store() -> Arc<InMemoryStateStore> {
    Arc::new(InMemoryStateStore::new(GameState::new_session()))
}

/// A session with the given metric overrides.
pub fn session_with(values: &[(&str, i64)]) -> GameState {
    let mut state = GameState::new_session();
    for (name, value) in values {
        state.metrics.values.insert((*name).to_owned(), *value);
    }
    state
}

/// A session that wins on perfect harmony at the end of its next turn.
pub fn harmonious_session() -> GameState {
    session_with(&[(metric::MORALE, 95), (metric::CORRUPTION, 0)])
}
