//! Riftward Core — shared domain types and seams.
//!
//! This crate defines the game state, the function-call value that flows
//! through the safe-function pipeline, the error taxonomy, and the traits
//! every other component is written against. It contains no infrastructure
//! code.

pub mod call;
pub mod clock;
pub mod error;
pub mod generator;
pub mod rng;
pub mod state;
pub mod store;
