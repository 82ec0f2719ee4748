//! Integration tests for full turns.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use riftward_core::error::EngineError;
use riftward_core::generator::GeneratorRole;
use riftward_core::state::{WinLoss, metric};
use riftward_functions::RateLimits;
use riftward_orchestrator::{CallSource, OrchestratorConfig};
use riftward_test_support::{
    FixedJudge, InMemoryStateStore, ScriptedGenerator, StallingGenerator,
};
use serde_json::json;

fn character_payload() -> serde_json::Value {
    json!([
        {
            "name": "Mira",
            "intent": "reassure",
            "action": "grips the player's arm",
            "speech": "I trust you now.",
            "effects": {"trust_delta": 1}
        },
        {
            "name": "Oren",
            "intent": "dismiss",
            "action": "scoffs",
            "speech": "Nonsense."
        }
    ])
}

#[tokio::test]
async fn test_consecutive_turns_accumulate_history() {
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store);

    for expected in 1..=3 {
        let result = orchestrator.run_turn(None).await.unwrap();
        assert_eq!(result.turn, expected);
        if result.finalized {
            break;
        }
    }

    let state = store.state();
    assert!(state.turn >= 1);
    assert_eq!(state.recent_events.len(), state.turn as usize);
    assert!(state.previous_glitch.is_some());
}

#[tokio::test]
async fn test_same_seed_replays_identically() {
    let first = common::new_store();
    let second = common::new_store();
    let mut a = common::build_orchestrator(common::test_config(), &first);
    let mut b = common::build_orchestrator(common::test_config(), &second);

    let left = a.run_turn(Some("scout")).await.unwrap();
    let right = b.run_turn(Some("scout")).await.unwrap();

    assert_eq!(left, right);
    assert_eq!(first.state(), second.state());
}

#[tokio::test]
async fn test_duplicate_weather_from_many_sources_executes_once() {
    let generator = ScriptedGenerator::new()
        .with(
            GeneratorRole::Event,
            json!({
                "scene": "Fog rolls in off the marsh.",
                "options": [{"id": "wait", "text": "Wait it out", "action_type": "cautious"}],
                "function_calls": [{"name": "change_weather", "kwargs": {"atmosphere": "Cold Fog"}}]
            }),
        )
        .with(
            GeneratorRole::World,
            json!({
                "atmosphere": "cold fog",
                "sensory_details": "Everything drips.",
                "function_calls": [{"name": "change_weather", "kwargs": {"atmosphere": "cold   fog"}}]
            }),
        );
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator));

    let result = orchestrator.run_turn(None).await.unwrap();

    let weather: Vec<_> = result
        .executed_calls
        .iter()
        .filter(|call| call.name == "change_weather")
        .collect();
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].source, CallSource::Event);
    assert_eq!(
        store.state().last_weather.map(|w| w.atmosphere),
        Some("Cold Fog".to_owned())
    );
}

#[tokio::test]
async fn test_failed_persist_leaves_state_identical() {
    let before = common::session_with(&[(metric::MORALE, 50)]);
    // Persist #1 is the synthesized weather change, #2 the end of turn.
    let store = Arc::new(InMemoryStateStore::failing_persist_at(before.clone(), 2));
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store);

    let result = orchestrator.run_turn(None).await;

    assert!(matches!(result, Err(EngineError::Store(_))));
    assert_eq!(store.state(), before);
}

#[tokio::test]
async fn test_generator_timeout_is_fatal_and_rolls_back() {
    let inner = ScriptedGenerator::new().with(
        GeneratorRole::Event,
        json!({
            "scene": "The bell tower groans.",
            "function_calls": [{"name": "set_flag", "kwargs": {"flag": "bell_heard"}}]
        }),
    );
    let generator = Arc::new(StallingGenerator::new(GeneratorRole::Character, inner));
    let store = common::new_store();
    let before = store.state();
    let mut orchestrator =
        common::build_orchestrator(common::test_config(), &store).with_generator(generator.clone());

    let result = orchestrator.run_turn(None).await;

    assert_eq!(
        result,
        Err(EngineError::Timeout {
            role: "character".into(),
            attempts: 1,
        })
    );
    assert_eq!(generator.attempts(), 1);
    assert_eq!(store.state(), before);
}

#[tokio::test]
async fn test_judge_veto_rejects_updates_and_penalizes_flavor() {
    let generator =
        ScriptedGenerator::new().with(GeneratorRole::Character, character_payload());
    let judge = Arc::new(FixedJudge::vetoing(["Mira", "Oren"]));
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator))
        .with_judge(judge.clone());

    let result = orchestrator.run_turn(None).await.unwrap();

    let mira = &result.character_reactions[0];
    assert_eq!(mira.name, "Mira");
    assert_ne!(mira.speech, "I trust you now.");
    assert!(mira.effects.is_none());
    assert_eq!(result.character_reactions[1].speech, "Nonsense.");
    assert_eq!(judge.requests().len(), 2);

    let state = store.state();
    assert_eq!(state.trust("Mira"), 0);
    assert!(
        state
            .metrics
            .log
            .iter()
            .any(|change| change.cause == "judge_soft_penalty")
    );
}

#[tokio::test]
async fn test_vetoed_reaction_calls_never_execute() {
    let generator = ScriptedGenerator::new().with(
        GeneratorRole::Character,
        json!([
            {
                "name": "Mira",
                "intent": "sabotage",
                "action": "smashes the ward stone",
                "speech": "It was already cracked.",
                "function_calls": [
                    {"name": "set_flag", "kwargs": {"flag": "ward_destroyed"}},
                    {"name": "adjust_metric", "kwargs": {"metric": "order", "delta": -40}}
                ]
            },
            {
                "name": "Oren",
                "intent": "help",
                "action": "lights the lanterns",
                "speech": "Better.",
                "function_calls": [{"name": "set_flag", "kwargs": {"flag": "lanterns_lit"}}]
            }
        ]),
    );
    let judge = Arc::new(FixedJudge::vetoing(["Mira"]));
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator))
        .with_judge(judge.clone());

    let result = orchestrator.run_turn(None).await.unwrap();

    assert_eq!(result.executed_names(), vec!["change_weather", "set_flag"]);
    assert_eq!(
        result.executed_calls[1].source,
        CallSource::Character("Oren".to_owned())
    );
    assert_ne!(result.character_reactions[0].speech, "It was already cracked.");
    assert!(judge.requests()[0].summary.contains("ward_destroyed"));
    assert!(
        result
            .warnings
            .iter()
            .any(|warning| warning.contains("scripted reaction used"))
    );
    assert!(
        !result
            .warnings
            .iter()
            .any(|warning| warning.contains("glitch penalty"))
    );

    let state = store.state();
    assert!(state.flags.contains("lanterns_lit"));
    assert!(!state.flags.contains("ward_destroyed"));
    // Only the glitch roll may have touched order.
    assert!(state.metrics.get(metric::ORDER) >= 57);
}

#[tokio::test]
async fn test_glitch_moves_at_most_one_step_per_turn() {
    let generator = ScriptedGenerator::new().with(
        GeneratorRole::Character,
        json!([
            {"name": "Mira", "intent": "mock", "action": "laughs", "speech": "Ha."},
            {"name": "Oren", "intent": "mock", "action": "sneers", "speech": "Hm."}
        ]),
    );
    let mut start = common::session_with(&[(metric::GLITCH, 20)]);
    start.metrics.glitch_carry = 40;
    let store = Arc::new(InMemoryStateStore::new(start));
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator))
        .with_judge(Arc::new(FixedJudge::vetoing(["Mira", "Oren"])));

    let first = orchestrator.run_turn(None).await.unwrap();

    let state = store.state();
    let penalties: Vec<_> = state
        .metrics
        .log
        .iter()
        .filter(|change| change.cause == "judge_soft_penalty")
        .map(|change| change.delta)
        .collect();
    assert_eq!(penalties, vec![10, 0]);
    assert_eq!(state.metrics.get(metric::GLITCH), 30);
    assert!(state.metrics.glitch_carry > 30);
    assert_eq!(state.metrics.glitch_moved, 0);

    if !first.finalized {
        orchestrator.run_turn(None).await.unwrap();
        let state = store.state();
        assert_eq!(state.metrics.get(metric::GLITCH), 40);
        assert_eq!(state.metrics.glitch_moved, 0);
    }
}

#[tokio::test]
async fn test_approved_update_changes_trust() {
    let generator =
        ScriptedGenerator::new().with(GeneratorRole::Character, character_payload());
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator))
        .with_judge(Arc::new(FixedJudge::approving()));

    orchestrator.run_turn(None).await.unwrap();

    assert_eq!(store.state().trust("Mira"), 1);
}

#[tokio::test]
async fn test_judge_timeout_aborts_turn() {
    let generator =
        ScriptedGenerator::new().with(GeneratorRole::Character, character_payload());
    let store = common::new_store();
    let before = store.state();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator))
        .with_judge(Arc::new(FixedJudge::timing_out()));

    let result = orchestrator.run_turn(None).await;

    assert!(matches!(result, Err(EngineError::Timeout { .. })));
    assert_eq!(store.state(), before);
}

#[tokio::test]
async fn test_rate_limited_calls_become_warnings() {
    let generator = ScriptedGenerator::new().with(
        GeneratorRole::Event,
        json!({
            "scene": "Three banners are raised at once.",
            "function_calls": [
                {"name": "set_flag", "kwargs": {"flag": "red"}},
                {"name": "set_flag", "kwargs": {"flag": "blue"}},
                {"name": "set_flag", "kwargs": {"flag": "gold"}}
            ]
        }),
    );
    let config = OrchestratorConfig {
        rate_limits: RateLimits {
            global_per_turn: Some(2),
            per_function: BTreeMap::new(),
        },
        ..common::test_config()
    };
    let store = common::new_store();
    let mut orchestrator =
        common::build_orchestrator(config, &store).with_generator(Arc::new(generator));

    let result = orchestrator.run_turn(None).await.unwrap();

    assert_eq!(result.executed_names(), vec!["set_flag", "set_flag"]);
    assert!(
        result
            .warnings
            .iter()
            .any(|warning| warning.contains("rate limit exceeded"))
    );
    let flags = store.state().flags;
    assert!(flags.contains("red") && flags.contains("blue"));
    assert!(!flags.contains("gold"));
}

#[tokio::test]
async fn test_session_functions_can_be_registered() {
    let generator = ScriptedGenerator::new().with(
        GeneratorRole::Event,
        json!({
            "scene": "A courier waits by the gate.",
            "function_calls": [
                {"name": "ring_bell", "kwargs": {"times": 3}},
                {"name": "launch_catapult"}
            ]
        }),
    );
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store)
        .with_generator(Arc::new(generator));
    orchestrator
        .registry_mut()
        .register("ring_bell", |call| {
            Ok(json!({"rang": call.kwarg_i64("times").unwrap_or(1)}))
        })
        .unwrap();

    let result = orchestrator.run_turn(None).await.unwrap();

    let bell = result
        .executed_calls
        .iter()
        .find(|call| call.name == "ring_bell")
        .unwrap();
    assert_eq!(bell.result, json!({"rang": 3}));
    assert!(
        result
            .warnings
            .iter()
            .any(|warning| warning.contains("function not registered: launch_catapult"))
    );
}

#[tokio::test]
async fn test_disabled_generation_never_calls_generator() {
    let generator = Arc::new(
        ScriptedGenerator::new().with(GeneratorRole::Event, json!({"scene": "unused"})),
    );
    let config = OrchestratorConfig {
        generation_enabled: false,
        ..common::test_config()
    };
    let store = common::new_store();
    let mut orchestrator = common::build_orchestrator(config, &store).with_generator(generator.clone());

    let result = orchestrator.run_turn(None).await.unwrap();

    assert!(generator.calls().is_empty());
    assert_ne!(result.event.map(|event| event.scene), Some("unused".to_owned()));
    assert_eq!(result.character_reactions.len(), 3);
}

#[tokio::test]
async fn test_generator_sees_scene_and_roster() {
    let generator = Arc::new(ScriptedGenerator::new());
    let store = common::new_store();
    let mut orchestrator =
        common::build_orchestrator(common::test_config(), &store).with_generator(generator.clone());

    let result = orchestrator.run_turn(None).await.unwrap();

    assert_eq!(generator.calls_for(GeneratorRole::Character), 1);
    let calls = generator.calls();
    let (_, variables) = calls
        .iter()
        .find(|(role, _)| *role == GeneratorRole::Character)
        .unwrap();
    assert_eq!(variables["characters"], json!(["Mira", "Oren", "Tamsin"]));
    assert!(variables.contains_key("scene"));
    assert!(variables.contains_key("atmosphere"));
    // Every unscripted role fell back with a warning.
    assert_eq!(result.warnings.len(), 3);
}

#[tokio::test]
async fn test_win_finalizes_and_later_turns_short_circuit() {
    let store = Arc::new(InMemoryStateStore::new(common::harmonious_session()));
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store);

    let result = orchestrator.run_turn(None).await.unwrap();
    assert!(result.finalized);
    assert_eq!(result.win_loss, WinLoss::win("perfect_harmony"));

    let persisted = store.persist_count();
    let state = store.state();
    let again = orchestrator.run_turn(None).await.unwrap();

    assert!(again.finalized);
    assert_eq!(again.win_loss, WinLoss::win("perfect_harmony"));
    assert_eq!(again.turn, result.turn);
    assert!(again.glitch.is_none());
    assert_eq!(store.persist_count(), persisted);
    assert_eq!(store.state(), state);
}

#[tokio::test]
async fn test_morale_crash_is_a_loss() {
    let store = Arc::new(InMemoryStateStore::new(common::session_with(&[(
        metric::MORALE,
        5,
    )])));
    let mut orchestrator = common::build_orchestrator(common::test_config(), &store);

    let result = orchestrator.run_turn(None).await.unwrap();

    assert_eq!(result.win_loss, WinLoss::loss("morale_crash"));
    assert_eq!(store.state().verdict, Some(WinLoss::loss("morale_crash")));
}
