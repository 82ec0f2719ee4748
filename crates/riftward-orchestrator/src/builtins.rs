//! Built-in safe functions.
//!
//! Each function pairs a sanitizing validator with an executable that reads
//! and writes the state store. Validators trim strings, coerce numeric
//! arguments, and reject empty values, so the executables only ever see
//! well-formed keyword arguments.

use std::sync::Arc;

use riftward_core::call::FunctionCall;
use riftward_core::error::{ExecutionError, RegistryError, ValidationError};
use riftward_core::state::{PLAYER_CONTAINER, WeatherRecord, WorldConstraint};
use riftward_core::store::{StateStore, update_state};
use riftward_functions::SafeFunctionRegistry;
use riftward_metrics::{MetricManager, MetricPolicy};
use riftward_rules::{ItemChange, move_item};
use serde_json::{Value, json};

pub const ADJUST_METRIC: &str = "adjust_metric";
pub const CHANGE_WEATHER: &str = "change_weather";
pub const SET_FLAG: &str = "set_flag";
pub const RECORD_EVENT: &str = "record_event";
pub const MOVE_ITEM: &str = "move_item";

const DEFAULT_CAUSE: &str = "safe_function";

/// Settings the built-in executables need.
#[derive(Debug, Clone)]
pub struct BuiltinSettings {
    /// Bounds and glitch budget for `adjust_metric`.
    pub policy: MetricPolicy,
    /// Most recent events kept by `record_event`.
    pub recent_events_cap: usize,
    /// Flags with this prefix count as major events.
    pub major_event_prefix: String,
}

/// Registers every built-in against `store`.
///
/// # Errors
///
/// Returns `RegistryError::AlreadyRegistered` if a built-in name is taken.
pub fn register_builtins(
    registry: &mut SafeFunctionRegistry,
    store: &Arc<dyn StateStore>,
    settings: &BuiltinSettings,
) -> Result<(), RegistryError> {
    let target = Arc::clone(store);
    let policy = settings.policy.clone();
    let internal = settings.policy.clone();
    registry.register_with_validator(
        ADJUST_METRIC,
        move |call: &FunctionCall| {
            let metric = required(call, "metric")?;
            let delta = call
                .kwarg_i64("delta")
                .ok_or_else(|| ExecutionError("delta missing".to_owned()))?;
            let cause = call.kwarg_str("cause").unwrap_or(DEFAULT_CAUSE).to_owned();
            let change = update_state(target.as_ref(), |state| {
                MetricManager::new(&policy, &mut state.metrics).adjust_metric(metric, delta, &cause)
            })?;
            Ok(json!(change))
        },
        move |call| {
            let metric = sanitized_text(&call, "metric")?.to_lowercase();
            if internal.is_internal(&metric) {
                return Err(ValidationError::rejected(
                    ADJUST_METRIC,
                    format!("metric `{metric}` is internal"),
                ));
            }
            let delta = coerced_int(&call, "delta")?;
            let cause = optional_text(&call, "cause").unwrap_or_else(|| DEFAULT_CAUSE.to_owned());
            Ok(call
                .with_kwarg("metric", metric)
                .with_kwarg("delta", delta)
                .with_kwarg("cause", cause))
        },
    )?;

    let target = Arc::clone(store);
    registry.register_with_validator(
        CHANGE_WEATHER,
        move |call: &FunctionCall| {
            let atmosphere = required(call, "atmosphere")?.to_owned();
            let sensory_details = call.kwarg_str("sensory_details").unwrap_or_default().to_owned();
            let turn = update_state(target.as_ref(), |state| {
                let turn = state.turn + 1;
                state.last_weather = Some(WeatherRecord {
                    atmosphere: atmosphere.clone(),
                    turn,
                });
                state.world_constraint_from_prev_turn = Some(WorldConstraint {
                    atmosphere: atmosphere.clone(),
                    sensory_details: sensory_details.clone(),
                });
                turn
            })?;
            Ok(json!({"atmosphere": atmosphere, "turn": turn}))
        },
        |call| {
            let atmosphere = sanitized_text(&call, "atmosphere")?;
            let sensory_details = optional_text(&call, "sensory_details").unwrap_or_default();
            Ok(call
                .with_kwarg("atmosphere", atmosphere)
                .with_kwarg("sensory_details", sensory_details))
        },
    )?;

    let target = Arc::clone(store);
    let prefix = settings.major_event_prefix.clone();
    registry.register_with_validator(
        SET_FLAG,
        move |call: &FunctionCall| {
            let flag = required(call, "flag")?.to_owned();
            let added = update_state(target.as_ref(), |state| {
                let added = state.flags.insert(flag.clone());
                if added && !prefix.is_empty() && flag.starts_with(prefix.as_str()) {
                    state.major_event_count += 1;
                    state.last_major_event_turn = Some(state.turn + 1);
                }
                added
            })?;
            Ok(json!({"flag": flag, "added": added}))
        },
        |call| {
            let flag = sanitized_text(&call, "flag")?;
            Ok(call.with_kwarg("flag", flag))
        },
    )?;

    let target = Arc::clone(store);
    let cap = settings.recent_events_cap;
    registry.register_with_validator(
        RECORD_EVENT,
        move |call: &FunctionCall| {
            let text = required(call, "text")?.to_owned();
            update_state(target.as_ref(), |state| {
                state.push_recent_event(text.clone(), cap);
            })?;
            Ok(json!({"recorded": text}))
        },
        |call| {
            let text = sanitized_text(&call, "text")?;
            Ok(call.with_kwarg("text", text))
        },
    )?;

    let target = Arc::clone(store);
    registry.register_with_validator(
        MOVE_ITEM,
        move |call: &FunctionCall| {
            let change = ItemChange {
                item: required(call, "item")?.to_owned(),
                delta: call
                    .kwarg_i64("delta")
                    .ok_or_else(|| ExecutionError("delta missing".to_owned()))?,
                target: required(call, "target")?.to_owned(),
            };
            let moved = update_state(target.as_ref(), |state| move_item(state, &change))?;
            Ok(json!({"item": change.item, "target": change.target, "moved": moved}))
        },
        |call| {
            let item = sanitized_text(&call, "item")?;
            let mut target = sanitized_text(&call, "target")?;
            if target == "inventory" {
                PLAYER_CONTAINER.clone_into(&mut target);
            }
            let delta = coerced_int(&call, "delta")?;
            if delta != 1 && delta != -1 {
                return Err(ValidationError::rejected(MOVE_ITEM, "delta must be -1 or 1"));
            }
            Ok(call
                .with_kwarg("item", item)
                .with_kwarg("target", target)
                .with_kwarg("delta", delta))
        },
    )?;

    Ok(())
}

fn required<'a>(call: &'a FunctionCall, key: &str) -> Result<&'a str, ExecutionError> {
    call.kwarg_str(key)
        .ok_or_else(|| ExecutionError(format!("{key} missing")))
}

fn sanitized_text(call: &FunctionCall, key: &str) -> Result<String, ValidationError> {
    optional_text(call, key)
        .ok_or_else(|| ValidationError::rejected(call.name(), format!("`{key}` must be a non-empty string")))
}

fn optional_text(call: &FunctionCall, key: &str) -> Option<String> {
    call.kwarg_str(key)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

#[allow(clippy::cast_possible_truncation)]
fn coerced_int(call: &FunctionCall, key: &str) -> Result<i64, ValidationError> {
    let coerced = match call.kwarg(key) {
        Some(Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i64)
        }),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    coerced.ok_or_else(|| ValidationError::rejected(call.name(), format!("`{key}` must be an integer")))
}
