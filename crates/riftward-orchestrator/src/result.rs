//! Per-turn output.

use std::collections::BTreeMap;

use riftward_core::call::Kwargs;
use riftward_core::state::WinLoss;
use riftward_glitch::GlitchOutcome;
use riftward_rules::Reaction;
use serde::Serialize;
use serde_json::Value;

use crate::content::{ChoiceOption, EventContent, WorldContent};
use crate::guardrails::CallSource;

/// Audit entry for one executed safe function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedCall {
    /// Registered function name.
    pub name: String,
    /// Sanitized keyword arguments as executed.
    pub kwargs: Kwargs,
    /// Where the call was collected from.
    pub source: CallSource,
    /// What the executable returned.
    pub result: Value,
}

/// Everything a turn produced.
///
/// `event`, `world` and `player_choice` are absent when the game was already
/// finalized and nothing was generated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    /// The turn played, or the last one played for a finalized game.
    pub turn: u32,
    /// RFC 3339 time the result was produced.
    pub timestamp: String,
    /// Atmosphere for the turn.
    pub world: Option<WorldContent>,
    /// Scene and options offered.
    pub event: Option<EventContent>,
    /// The option that was resolved.
    pub player_choice: Option<ChoiceOption>,
    /// Reactions that survived validation, in roster order.
    pub character_reactions: Vec<Reaction>,
    /// Safe functions executed, in execution order.
    pub executed_calls: Vec<ExecutedCall>,
    /// Public metrics at the end of the turn.
    pub metrics_after: BTreeMap<String, i64>,
    /// The glitch roll, absent for a finalized game.
    pub glitch: Option<GlitchOutcome>,
    /// Verdict after this turn.
    pub win_loss: WinLoss,
    /// Whether the game is over after this turn.
    pub finalized: bool,
    /// Recoverable problems met while playing the turn.
    pub warnings: Vec<String>,
}

impl TurnResult {
    /// Names of the executed calls, in execution order.
    #[must_use]
    pub fn executed_names(&self) -> Vec<&str> {
        self.executed_calls
            .iter()
            .map(|call| call.name.as_str())
            .collect()
    }

    /// The resolved choice, if the turn was played.
    #[must_use]
    pub fn choice(&self) -> Option<&ChoiceOption> {
        self.player_choice.as_ref()
    }
}
