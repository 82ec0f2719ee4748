//! The transactional turn pipeline.
//!
//! A turn is all-or-nothing: a checkpoint of the stored state is taken before
//! anything is generated, and any fatal error restores it before the error is
//! returned. Recoverable problems (a malformed reaction, a vetoed update, a
//! rejected safe function) are downgraded to warnings and the turn continues
//! with scripted content in their place.

use std::collections::BTreeMap;
use std::sync::Arc;

use riftward_core::call::{FunctionCall, Kwargs};
use riftward_core::clock::Clock;
use riftward_core::error::{EngineError, StoreError};
use riftward_core::generator::{Generator, GeneratorRole, Judge, Variables};
use riftward_core::rng::SeededRng;
use riftward_core::state::{GameState, MetricSet, WinLoss, metric};
use riftward_core::store::StateStore;
use riftward_functions::{FunctionCallValidator, SafeFunctionRegistry};
use riftward_glitch::{GlitchManager, GlitchOutcome};
use riftward_metrics::{MetricManager, MetricPolicy};
use riftward_rollback::RollbackSystem;
use riftward_rules::{Reaction, RulesEngine, SceneContext};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::builtins::{BuiltinSettings, CHANGE_WEATHER, register_builtins};
use crate::config::OrchestratorConfig;
use crate::content::{EventContent, WorldContent, reaction_entries, scripted_reaction};
use crate::gateway::{GeneratorGateway, GeneratorJudge};
use crate::guardrails::{CallCollector, CallSource, CollectedCall, apply_guardrails};
use crate::result::{ExecutedCall, TurnResult};

const SOFT_PENALTY_CAUSE: &str = "judge_soft_penalty";
const GLITCH_CAUSE: &str = "glitch";
const BOUNDS_CAUSE: &str = "bounds";
const GLITCH_CASCADE: &str = "glitch_cascade";

/// A reaction and whether it came from the generator.
struct Candidate {
    reaction: Reaction,
    generated: bool,
}

/// Runs turns against a state store.
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn StateStore>,
    validator: FunctionCallValidator,
    rollback: RollbackSystem<GameState>,
    rules: RulesEngine,
    gateway: Option<GeneratorGateway>,
    judge: Option<Arc<dyn Judge>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("config", &self.config)
            .field("gateway", &self.gateway)
            .field("rollback", &self.rollback)
            .finish_non_exhaustive()
    }
}

impl TurnOrchestrator {
    /// Creates an orchestrator with the built-in safe functions registered
    /// and no generator attached. Without a generator every turn uses
    /// scripted content.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Registry` if the built-ins cannot be registered.
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let mut registry = SafeFunctionRegistry::new();
        register_builtins(
            &mut registry,
            &store,
            &BuiltinSettings {
                policy: config.metrics.clone(),
                recent_events_cap: config.recent_events_cap,
                major_event_prefix: config.major_event_prefix.clone(),
            },
        )?;
        let validator = FunctionCallValidator::new(registry, config.rate_limits.clone());
        // The turn checkpoint must survive the per-call checkpoint above it.
        let rollback = RollbackSystem::for_store(
            Arc::clone(&store),
            config.max_checkpoints.max(2),
            Arc::clone(&clock),
        );
        let rules = RulesEngine::new(config.rules_config());

        Ok(Self {
            config,
            store,
            validator,
            rollback,
            rules,
            gateway: None,
            judge: None,
            clock,
        })
    }

    /// Attaches the content generator. Its `judge` role also serves as the
    /// semantic judge unless one is set explicitly.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.gateway = Some(GeneratorGateway::new(
            generator,
            self.config.generator_timeout(),
            self.config.generator_retries,
        ));
        self
    }

    /// Sets the semantic judge.
    #[must_use]
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// The configuration this orchestrator was built with.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The safe functions calls are dispatched to.
    #[must_use]
    pub fn registry(&self) -> &SafeFunctionRegistry {
        self.validator.registry()
    }

    /// Registry access for adding session-specific safe functions.
    pub fn registry_mut(&mut self) -> &mut SafeFunctionRegistry {
        self.validator.registry_mut()
    }

    /// A copy of the stored state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    pub fn state(&self) -> Result<GameState, StoreError> {
        self.store.snapshot()
    }

    /// Plays one turn. `choice` is the id of the option the player picked;
    /// an unknown or missing id resolves to the first option offered.
    ///
    /// A game that is already decided is not played again: its verdict is
    /// returned without generating, rolling, or writing anything.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that aborted the turn (a generator timeout, a
    /// store failure, a rollback failure). The stored state is restored to
    /// its pre-turn value before the error is returned.
    #[instrument(skip(self), fields(seed = self.config.seed))]
    pub async fn run_turn(&mut self, choice: Option<&str>) -> Result<TurnResult, EngineError> {
        let state = self.store.snapshot()?;
        if state.is_finalized() {
            info!(turn = state.turn, "game already decided, nothing to play");
            return Ok(self.finalized_result(&state));
        }

        let turn = state.turn + 1;
        info!(turn, "turn started");
        self.validator.reset();
        let mut metadata = Kwargs::new();
        metadata.insert("kind".to_owned(), json!("turn"));
        metadata.insert("turn".to_owned(), json!(turn));
        let checkpoint = self.rollback.create_checkpoint(metadata, None)?;

        match self.play_turn(state, turn, choice).await {
            Ok(result) => {
                self.rollback.commit();
                info!(
                    turn,
                    status = ?result.win_loss.status,
                    executed = result.executed_calls.len(),
                    warnings = result.warnings.len(),
                    "turn finished"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(turn, error = %err, "turn aborted, restoring pre-turn state");
                self.rollback.rollback_to(checkpoint)?;
                self.rollback.commit();
                Err(err)
            }
        }
    }

    async fn play_turn(
        &mut self,
        state: GameState,
        turn: u32,
        requested: Option<&str>,
    ) -> Result<TurnResult, EngineError> {
        let mut warnings = Vec::new();
        let mut variables = self.base_variables(&state, turn);

        let event = self.generate_event(&variables, turn, &mut warnings).await?;
        let choice = event.resolve_choice(requested);
        debug!(turn, choice = %choice.id, "choice resolved");
        variables.insert("scene".to_owned(), json!(event.scene));
        variables.insert("player_choice".to_owned(), json!(choice.text));
        variables.insert("action_type".to_owned(), json!(choice.action_type));

        let world = self.generate_world(&variables, turn, &mut warnings).await?;
        variables.insert("atmosphere".to_owned(), json!(world.atmosphere));
        variables.insert("sensory_details".to_owned(), json!(world.sensory_details));

        let candidates = self
            .generate_reactions(&variables, turn, &mut warnings)
            .await?;
        let context = SceneContext {
            scene: event.scene.clone(),
            choice: choice.text.clone(),
            world_context: world.context_line(),
        };
        let (reactions, soft_penalties) = self
            .judge_reactions(candidates, &context, &state, turn, &mut warnings)
            .await?;

        let mut collector = CallCollector::new();
        collector.collect(&CallSource::Event, &event.proposed_calls);
        collector.collect(&CallSource::World, &world.proposed_calls);
        collector.push(
            CallSource::Synthesized,
            FunctionCall::new(CHANGE_WEATHER)?
                .with_kwarg("atmosphere", world.atmosphere.clone())
                .with_kwarg("sensory_details", world.sensory_details.clone()),
        );
        for reaction in &reactions {
            collector.collect(
                &CallSource::Character(reaction.name.clone()),
                &reaction.proposed_calls,
            );
        }
        let (collected, collect_warnings) = collector.finish();
        warnings.extend(collect_warnings);
        let (calls, guard_warnings) =
            apply_guardrails(collected, &state, turn, &self.config.guardrails);
        warnings.extend(guard_warnings);
        let executed_calls = self.execute_calls(calls, turn, &mut warnings)?;

        // Safe functions wrote through the store.
        let mut state = self.store.snapshot()?;
        self.rules.record_choice(&mut state, &choice.action_type);
        for reaction in &reactions {
            self.rules.apply_effects(&mut state, turn, reaction);
        }
        self.rules.tick_status_effects(&mut state);

        let mut glitch_manager = GlitchManager::new(self.config.seed, state.previous_glitch);
        let glitch = {
            let mut metrics = MetricManager::new(&self.config.metrics, &mut state.metrics);
            for _ in 0..soft_penalties {
                metrics.adjust_metric(metric::GLITCH, 1, SOFT_PENALTY_CAUSE);
            }
            let mut rng = SeededRng::for_turn(self.config.seed, turn);
            self.rules.apply_environment(&mut metrics, &mut rng);

            let outcome = glitch_manager.resolve_turn(turn, metrics.value(metric::GLITCH), false);
            if let Some(outcome) = &outcome {
                for effect in &outcome.effects {
                    metrics.adjust_metric(effect.metric, effect.delta, GLITCH_CAUSE);
                }
            }
            metrics.enforce_bounds(BOUNDS_CAUSE);
            outcome
        };
        state.previous_glitch = glitch_manager.previous();
        state.metrics.close_turn();
        state.turn = turn;

        let metrics_after = public_metrics(&self.config.metrics, &state.metrics);
        let mut win_loss = self
            .rules
            .evaluate(&metrics_after, turn, state.major_event_count);
        if !win_loss.is_terminal() && glitch.as_ref().is_some_and(|g| g.triggered_loss) {
            info!(turn, "glitch cascade ends the game");
            win_loss = WinLoss::loss(GLITCH_CASCADE);
        }
        state.verdict = Some(win_loss.clone());
        state.push_recent_event(
            format!("Turn {turn}: {} Choice: {}", event.scene, choice.text),
            self.config.recent_events_cap,
        );
        state.world_constraint_from_prev_turn = Some(world.constraint());
        self.store.persist(&state)?;

        Ok(TurnResult {
            turn,
            timestamp: self.clock.stamp(),
            world: Some(world),
            event: Some(event),
            player_choice: Some(choice),
            character_reactions: reactions,
            executed_calls,
            metrics_after,
            glitch,
            finalized: win_loss.is_terminal(),
            win_loss,
            warnings,
        })
    }

    fn active_gateway(&self) -> Option<&GeneratorGateway> {
        self.gateway
            .as_ref()
            .filter(|_| self.config.generation_enabled)
    }

    fn active_judge(&self) -> Option<Arc<dyn Judge>> {
        if !self.config.semantic_validation_enabled {
            return None;
        }
        self.judge.clone().or_else(|| {
            self.active_gateway()
                .map(|gateway| Arc::new(GeneratorJudge::new(gateway.clone())) as Arc<dyn Judge>)
        })
    }

    /// Asks the generator for `role`. `None` means scripted content should
    /// be used instead; only timeouts are fatal.
    async fn generate(
        &self,
        role: GeneratorRole,
        variables: &Variables,
        warnings: &mut Vec<String>,
    ) -> Result<Option<Value>, EngineError> {
        let Some(gateway) = self.active_gateway() else {
            return Ok(None);
        };
        match gateway.generate(role, variables).await {
            Ok(payload) => Ok(Some(payload)),
            Err(EngineError::Generator(err)) => {
                warn!(%role, error = %err, "generator failed, using scripted content");
                warnings.push(format!("{role}: {err}; scripted content used"));
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn generate_event(
        &self,
        variables: &Variables,
        turn: u32,
        warnings: &mut Vec<String>,
    ) -> Result<EventContent, EngineError> {
        let Some(payload) = self
            .generate(GeneratorRole::Event, variables, warnings)
            .await?
        else {
            return Ok(EventContent::scripted(turn));
        };
        Ok(EventContent::parse(&payload).unwrap_or_else(|reason| {
            warn!(%reason, "unusable event payload, using scripted scene");
            warnings.push(format!("event: {reason}; scripted scene used"));
            EventContent::scripted(turn)
        }))
    }

    async fn generate_world(
        &self,
        variables: &Variables,
        turn: u32,
        warnings: &mut Vec<String>,
    ) -> Result<WorldContent, EngineError> {
        let Some(payload) = self
            .generate(GeneratorRole::World, variables, warnings)
            .await?
        else {
            return Ok(WorldContent::scripted(turn));
        };
        Ok(WorldContent::parse(&payload).unwrap_or_else(|reason| {
            warn!(%reason, "unusable world payload, using scripted atmosphere");
            warnings.push(format!("world: {reason}; scripted atmosphere used"));
            WorldContent::scripted(turn)
        }))
    }

    /// Tier 1. Entries that fail structural validation are replaced by a
    /// scripted reaction when the character can still be named, and dropped
    /// otherwise.
    async fn generate_reactions(
        &self,
        variables: &Variables,
        turn: u32,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<Candidate>, EngineError> {
        let Some(payload) = self
            .generate(GeneratorRole::Character, variables, warnings)
            .await?
        else {
            return Ok(self
                .config
                .characters
                .iter()
                .map(|name| Candidate {
                    reaction: scripted_reaction(name, turn),
                    generated: false,
                })
                .collect());
        };

        let mut candidates = Vec::new();
        for entry in reaction_entries(&payload) {
            match self.rules.validate_structure(&entry) {
                Ok(reaction) => candidates.push(Candidate {
                    reaction,
                    generated: true,
                }),
                Err(err) => match entry
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                {
                    Some(name) => {
                        warnings.push(format!("{name}: {err}; scripted reaction used"));
                        candidates.push(Candidate {
                            reaction: scripted_reaction(name, turn),
                            generated: false,
                        });
                    }
                    None => warnings.push(format!("reaction dropped: {err}")),
                },
            }
        }
        Ok(candidates)
    }

    /// Tier 2. A veto on a reaction carrying effects or proposed calls
    /// replaces it with scripted flavor, so none of its calls are collected;
    /// a veto on flavor-only text keeps the text and counts a soft penalty.
    /// Returns the surviving reactions and the penalty count.
    async fn judge_reactions(
        &self,
        candidates: Vec<Candidate>,
        context: &SceneContext,
        state: &GameState,
        turn: u32,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<Reaction>, u32), EngineError> {
        let judge = self.active_judge();
        let mut reactions = Vec::with_capacity(candidates.len());
        let mut penalties = 0;

        for Candidate {
            reaction,
            generated,
        } in candidates
        {
            let Some(active) = judge.as_ref().filter(|_| generated) else {
                reactions.push(reaction);
                continue;
            };
            match self
                .rules
                .validate_semantics(active.as_ref(), &reaction, context, state)
                .await
            {
                Ok(()) => reactions.push(reaction),
                Err(EngineError::Semantic(veto)) if reaction.is_state_mutating() => {
                    warnings.push(format!("{veto}; scripted reaction used"));
                    reactions.push(scripted_reaction(&reaction.name, turn));
                }
                Err(EngineError::Semantic(veto)) => {
                    warnings.push(format!("{veto}; text kept with glitch penalty"));
                    penalties += 1;
                    reactions.push(reaction);
                }
                Err(err) => return Err(err),
            }
        }
        Ok((reactions, penalties))
    }

    fn execute_calls(
        &mut self,
        calls: Vec<CollectedCall>,
        turn: u32,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<ExecutedCall>, EngineError> {
        let mut executed = Vec::with_capacity(calls.len());
        for CollectedCall { call, source } in calls {
            let mut metadata = Kwargs::new();
            metadata.insert("turn".to_owned(), json!(turn));
            metadata.insert("source".to_owned(), json!(source.to_string()));

            match self.rollback.run_call(&mut self.validator, call, metadata) {
                Ok((call, result)) => executed.push(ExecutedCall {
                    name: call.name().to_owned(),
                    kwargs: call.kwargs().clone(),
                    source,
                    result,
                }),
                Err(err) if err.is_recoverable() => {
                    warn!(%source, error = %err, "safe function skipped");
                    warnings.push(format!("{source}: {err}"));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(executed)
    }

    fn base_variables(&self, state: &GameState, turn: u32) -> Variables {
        let mut variables = Variables::new();
        variables.insert("turn".to_owned(), json!(turn));
        variables.insert(
            "metrics".to_owned(),
            json!(public_metrics(&self.config.metrics, &state.metrics)),
        );
        variables.insert("flags".to_owned(), json!(state.flags));
        variables.insert("characters".to_owned(), json!(self.config.characters));
        variables.insert(
            "relationship_summary".to_owned(),
            json!(state.relationship_summary),
        );
        variables.insert("recent_events".to_owned(), json!(state.recent_events));
        variables.insert(
            "world_constraint".to_owned(),
            json!(state.world_constraint_from_prev_turn),
        );
        variables
    }

    fn finalized_result(&self, state: &GameState) -> TurnResult {
        TurnResult {
            turn: state.turn,
            timestamp: self.clock.stamp(),
            world: None,
            event: None,
            player_choice: None,
            character_reactions: Vec::new(),
            executed_calls: Vec::new(),
            metrics_after: public_metrics(&self.config.metrics, &state.metrics),
            glitch: None,
            win_loss: state.verdict.clone().unwrap_or_else(WinLoss::ongoing),
            finalized: true,
            warnings: vec!["game already finalized".to_owned()],
        }
    }
}

fn public_metrics(policy: &MetricPolicy, metrics: &MetricSet) -> BTreeMap<String, i64> {
    metrics
        .values
        .iter()
        .filter(|(name, _)| !policy.is_internal(name))
        .map(|(name, value)| (name.clone(), *value))
        .collect()
}
