//! Shared test mocks and utilities for the Riftward turn engine.

mod clock;
mod generator;
mod rng;
mod store;

pub use clock::FixedClock;
pub use generator::{FailingGenerator, FixedJudge, ScriptedGenerator, StallingGenerator};
pub use rng::SequenceRng;
pub use store::{FailingStateStore, InMemoryStateStore};
