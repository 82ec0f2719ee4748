//! Call collection and cross-source guardrails.
//!
//! Calls proposed by the event, world and character generators are pooled
//! in source order, then filtered before anything executes.

use std::collections::BTreeSet;
use std::fmt;

use riftward_core::call::FunctionCall;
use riftward_core::state::GameState;
use riftward_functions::payload::parse_payload_list;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::builtins::{ADJUST_METRIC, CHANGE_WEATHER};
use crate::config::GuardrailConfig;

/// Where a collected call came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CallSource {
    /// Proposed by the event content.
    Event,
    /// Proposed by the world content.
    World,
    /// Proposed by the named character's reaction.
    Character(String),
    /// Derived by the orchestrator from generated content.
    Synthesized,
}

impl fmt::Display for CallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event => f.write_str("event"),
            Self::World => f.write_str("world"),
            Self::Character(name) => write!(f, "character:{name}"),
            Self::Synthesized => f.write_str("synthesized"),
        }
    }
}

/// A parsed call and its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedCall {
    /// The parsed call.
    pub call: FunctionCall,
    /// Where it came from.
    pub source: CallSource,
}

/// Pools parsed calls in collection order.
#[derive(Debug, Default)]
pub struct CallCollector {
    calls: Vec<CollectedCall>,
    warnings: Vec<String>,
}

impl CallCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and adds every payload in `payloads`. Unparseable payloads
    /// become warnings.
    pub fn collect(&mut self, source: &CallSource, payloads: &Value) {
        for parsed in parse_payload_list(payloads) {
            match parsed {
                Ok(call) => {
                    debug!(function = call.name(), %source, "call collected");
                    self.calls.push(CollectedCall {
                        call,
                        source: source.clone(),
                    });
                }
                Err(err) => {
                    warn!(%source, error = %err, "dropping unparseable call");
                    self.warnings.push(format!("{source}: {err}"));
                }
            }
        }
    }

    /// Adds an already-built call.
    pub fn push(&mut self, source: CallSource, call: FunctionCall) {
        debug!(function = call.name(), %source, "call collected");
        self.calls.push(CollectedCall { call, source });
    }

    /// Collected calls and warnings.
    #[must_use]
    pub fn finish(self) -> (Vec<CollectedCall>, Vec<String>) {
        (self.calls, self.warnings)
    }
}

fn normalized(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Filters collected calls for turn `turn`:
/// exact duplicates are dropped; weather changes collapse by atmosphere and
/// are throttled against the last applied weather; adjustments to protected
/// metrics are refused; the remainder is capped.
#[must_use]
pub fn apply_guardrails(
    calls: Vec<CollectedCall>,
    state: &GameState,
    turn: u32,
    config: &GuardrailConfig,
) -> (Vec<CollectedCall>, Vec<String>) {
    let mut kept: Vec<CollectedCall> = Vec::with_capacity(calls.len());
    let mut warnings = Vec::new();
    let mut atmospheres = BTreeSet::new();

    let throttled = state.last_weather.as_ref().and_then(|weather| {
        (turn.saturating_sub(weather.turn) < config.weather_throttle_turns)
            .then(|| normalized(&weather.atmosphere))
    });

    for collected in calls {
        let call = &collected.call;
        let duplicate = kept.iter().any(|existing| {
            existing.call.name() == call.name()
                && existing.call.args() == call.args()
                && existing.call.kwargs() == call.kwargs()
        });
        if duplicate {
            debug!(function = call.name(), source = %collected.source, "duplicate call dropped");
            continue;
        }

        if call.name() == CHANGE_WEATHER {
            let atmosphere = normalized(call.kwarg_str("atmosphere").unwrap_or_default());
            if !atmospheres.insert(atmosphere.clone()) {
                debug!(%atmosphere, "repeated weather change collapsed");
                continue;
            }
            if throttled.as_deref() == Some(atmosphere.as_str()) {
                warn!(%atmosphere, "weather change throttled");
                warnings.push(format!("weather `{atmosphere}` throttled"));
                continue;
            }
        }

        if call.name() == ADJUST_METRIC {
            let metric = call.kwarg_str("metric").map(normalized).unwrap_or_default();
            if config.protected_metrics.contains(&metric) {
                warn!(%metric, source = %collected.source, "protected metric adjustment refused");
                warnings.push(format!(
                    "{}: adjust_metric on protected metric `{metric}` refused",
                    collected.source
                ));
                continue;
            }
        }

        if kept.len() >= config.max_collected_calls {
            warn!(
                function = call.name(),
                limit = config.max_collected_calls,
                "collected call cap reached"
            );
            warnings.push(format!(
                "{}: {} dropped, call cap {} reached",
                collected.source,
                call.name(),
                config.max_collected_calls
            ));
            continue;
        }
        kept.push(collected);
    }

    (kept, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftward_core::state::WeatherRecord;
    use serde_json::json;

    fn weather(atmosphere: &str) -> FunctionCall {
        FunctionCall::new(CHANGE_WEATHER)
            .unwrap()
            .with_kwarg("atmosphere", atmosphere)
    }

    fn collected(call: FunctionCall, source: CallSource) -> CollectedCall {
        CollectedCall { call, source }
    }

    #[test]
    fn test_collector_keeps_order_and_reports_bad_payloads() {
        let mut collector = CallCollector::new();
        collector.collect(
            &CallSource::Event,
            &json!([{"name": "set_flag", "kwargs": {"flag": "a"}}, 7]),
        );
        collector.collect(
            &CallSource::Character("Mira".into()),
            &json!({"name": "record_event", "kwargs": {"text": "t"}}),
        );

        let (calls, warnings) = collector.finish();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].source, CallSource::Event);
        assert_eq!(calls[1].call.name(), "record_event");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("event:"));
    }

    #[test]
    fn test_identical_weather_collapses_to_one_call() {
        let calls = vec![
            collected(weather("Cold fog"), CallSource::World),
            collected(weather("cold   fog"), CallSource::Synthesized),
        ];

        let (kept, warnings) =
            apply_guardrails(calls, &GameState::new_session(), 3, &GuardrailConfig::default());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source, CallSource::World);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_weather_repeat_inside_window_is_throttled() {
        let mut state = GameState::new_session();
        state.last_weather = Some(WeatherRecord {
            atmosphere: "cold fog".into(),
            turn: 3,
        });
        let config = GuardrailConfig::default();

        let (kept, warnings) = apply_guardrails(
            vec![collected(weather("cold fog"), CallSource::World)],
            &state,
            4,
            &config,
        );
        assert!(kept.is_empty());
        assert_eq!(warnings.len(), 1);

        let (kept, _) = apply_guardrails(
            vec![collected(weather("cold fog"), CallSource::World)],
            &state,
            5,
            &config,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_exact_duplicates_are_dropped_across_sources() {
        let flag = FunctionCall::new("set_flag").unwrap().with_kwarg("flag", "a");
        let calls = vec![
            collected(flag.clone(), CallSource::Event),
            collected(flag, CallSource::Character("Oren".into())),
        ];

        let (kept, _) =
            apply_guardrails(calls, &GameState::new_session(), 1, &GuardrailConfig::default());

        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_protected_metric_adjustment_is_refused() {
        let call = FunctionCall::new(ADJUST_METRIC)
            .unwrap()
            .with_kwarg("metric", "Glitch")
            .with_kwarg("delta", -50);

        let (kept, warnings) = apply_guardrails(
            vec![collected(call, CallSource::Event)],
            &GameState::new_session(),
            1,
            &GuardrailConfig::default(),
        );

        assert!(kept.is_empty());
        assert!(warnings[0].contains("protected metric `glitch`"));
    }

    #[test]
    fn test_call_cap() {
        let calls = (0..5)
            .map(|i| {
                collected(
                    FunctionCall::new("set_flag")
                        .unwrap()
                        .with_kwarg("flag", format!("f{i}")),
                    CallSource::Event,
                )
            })
            .collect();
        let config = GuardrailConfig {
            max_collected_calls: 3,
            ..GuardrailConfig::default()
        };

        let (kept, warnings) = apply_guardrails(calls, &GameState::new_session(), 1, &config);

        assert_eq!(kept.len(), 3);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_call_source_serializes_with_kind() {
        assert_eq!(
            serde_json::to_value(CallSource::Character("Mira".into())).unwrap(),
            json!({"kind": "character", "name": "Mira"})
        );
        assert_eq!(
            serde_json::to_value(CallSource::Event).unwrap(),
            json!({"kind": "event"})
        );
    }
}
