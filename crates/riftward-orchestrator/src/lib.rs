//! Riftward Orchestrator — runs game turns as transactions.
//!
//! Each turn generates an event, a world atmosphere and character reactions,
//! validates them, executes the safe functions they propose, applies rules,
//! the environment pass and the glitch roll, and evaluates win/loss. The
//! stored state either reflects the whole turn or none of it.

pub mod builtins;
pub mod config;
pub mod content;
pub mod gateway;
pub mod guardrails;
pub mod orchestrator;
pub mod result;

pub use config::{GuardrailConfig, OrchestratorConfig};
pub use content::{ChoiceOption, EventContent, WorldContent};
pub use gateway::{GeneratorGateway, GeneratorJudge};
pub use guardrails::CallSource;
pub use orchestrator::TurnOrchestrator;
pub use result::{ExecutedCall, TurnResult};
