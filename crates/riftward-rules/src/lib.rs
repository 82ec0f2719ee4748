//! Riftward — rules engine.
//!
//! Generated reactions pass two gates before they may touch state. Tier 1
//! converts the raw entry into a typed [`Reaction`] and rejects anything
//! malformed. Tier 2 asks an external judge whether the proposed update is
//! consistent with the scene. Only then are effects applied, always in the
//! same order, so identical inputs produce identical state.

pub mod effects;
pub mod environment;
pub mod outcome;
pub mod reaction;

use std::collections::BTreeMap;

use riftward_core::error::{EngineError, SemanticValidationError, StructuralValidationError};
use riftward_core::generator::{Judge, JudgeRequest};
use riftward_core::rng::DeterministicRng;
use riftward_core::state::{GameState, MetricChange, WinLoss};
use riftward_metrics::MetricManager;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use effects::{AppliedEffects, move_item, relationship_summary, trust_tier};
pub use outcome::WinLossRules;
pub use reaction::{Effects, ItemChange, Reaction, parse_reaction};

/// Action type of a player choice that counts toward the risk counter.
pub const RISK_ACTION: &str = "risk";

/// Tunables for the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesConfig {
    /// Maximum characters in a reaction's speech.
    pub max_speech_chars: usize,
    /// Flags starting with this prefix count as major events.
    pub major_event_prefix: String,
    /// Win/loss thresholds.
    pub win_loss: WinLossRules,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_speech_chars: 200,
            major_event_prefix: "major_".to_owned(),
            win_loss: WinLossRules::default(),
        }
    }
}

/// What the judge is shown besides the reaction itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneContext {
    /// Scene text for this turn.
    pub scene: String,
    /// Text of the resolved player choice.
    pub choice: String,
    /// Current atmosphere and sensory text.
    pub world_context: String,
}

/// Validates reactions, applies their effects, and evaluates win/loss.
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    config: RulesConfig,
}

impl RulesEngine {
    /// Creates an engine with `config`.
    #[must_use]
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Tier 1: parses a raw reaction entry.
    ///
    /// # Errors
    ///
    /// Returns the first `StructuralValidationError` the entry violates.
    pub fn validate_structure(&self, entry: &Value) -> Result<Reaction, StructuralValidationError> {
        parse_reaction(entry, self.config.max_speech_chars).inspect_err(|err| {
            warn!(error = %err, "reaction failed structural validation");
        })
    }

    /// Tier 2: submits a structurally valid reaction to `judge`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Semantic` when the judge finds the update
    /// inconsistent, and propagates judge failures such as timeouts.
    pub async fn validate_semantics(
        &self,
        judge: &dyn Judge,
        reaction: &Reaction,
        context: &SceneContext,
        state: &GameState,
    ) -> Result<(), EngineError> {
        let request = judge_request(reaction, context, state);
        let verdict = judge.judge(&request).await?;
        if verdict.consistent {
            debug!(character = %reaction.name, "judge accepted reaction");
            return Ok(());
        }
        warn!(
            character = %reaction.name,
            reason = %verdict.reason,
            "judge vetoed reaction"
        );
        Err(SemanticValidationError {
            character: reaction.name.clone(),
            reason: verdict.reason,
        }
        .into())
    }

    /// Applies a validated reaction's effects for turn `turn`.
    pub fn apply_effects(
        &self,
        state: &mut GameState,
        turn: u32,
        reaction: &Reaction,
    ) -> AppliedEffects {
        match &reaction.effects {
            Some(effects) => effects::apply(
                state,
                turn,
                &reaction.name,
                effects,
                &self.config.major_event_prefix,
            ),
            None => AppliedEffects::default(),
        }
    }

    /// Records the resolved choice's action type.
    pub fn record_choice(&self, state: &mut GameState, action_type: &str) {
        if action_type == RISK_ACTION {
            state.risk_count += 1;
            debug!(risk_count = state.risk_count, "risky choice recorded");
        }
    }

    /// Ages status effects by one turn. Returns how many expired.
    pub fn tick_status_effects(&self, state: &mut GameState) -> usize {
        effects::tick_status_effects(state)
    }

    /// Applies the environment pass through `metrics`.
    pub fn apply_environment(
        &self,
        metrics: &mut MetricManager<'_>,
        rng: &mut dyn DeterministicRng,
    ) -> Vec<MetricChange> {
        environment::apply_environment(metrics, rng)
    }

    /// Evaluates win/loss over a metrics snapshot.
    #[must_use]
    pub fn evaluate(
        &self,
        metrics: &BTreeMap<String, i64>,
        turn: u32,
        major_events: u32,
    ) -> WinLoss {
        let verdict = self.config.win_loss.evaluate(metrics, turn, major_events);
        if verdict.is_terminal() {
            info!(turn, status = ?verdict.status, reason = %verdict.reason, "game decided");
        }
        verdict
    }
}

fn judge_request(reaction: &Reaction, context: &SceneContext, state: &GameState) -> JudgeRequest {
    let proposed = reaction
        .effects
        .as_ref()
        .and_then(|effects| serde_json::to_string(effects).ok())
        .unwrap_or_else(|| "none".to_owned());
    let calls = if reaction.has_proposed_calls() {
        reaction.proposed_calls.to_string()
    } else {
        "none".to_owned()
    };
    JudgeRequest {
        summary: format!(
            "{}: {} \"{}\" | proposed: {} | calls: {} | scene: {} | choice: {}",
            reaction.name,
            reaction.action,
            reaction.speech,
            proposed,
            calls,
            context.scene,
            context.choice
        ),
        world_context: context.world_context.clone(),
        active_flags: state.flags.iter().cloned().collect(),
        status_effects: state
            .status_effects
            .iter()
            .map(|effect| format!("{}:{}({})", effect.target, effect.status, effect.duration))
            .collect(),
    }
}
