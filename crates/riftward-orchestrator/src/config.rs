//! Orchestrator configuration.
//!
//! Every field has a default, so an empty document is a valid configuration.
//! One value is injected per orchestrator; nothing here is process-global.

use std::collections::BTreeSet;
use std::time::Duration;

use riftward_functions::RateLimits;
use riftward_metrics::MetricPolicy;
use riftward_rules::{RulesConfig, WinLossRules};
use serde::{Deserialize, Serialize};

/// Cross-source limits applied to collected calls before execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// A weather change repeating the last applied atmosphere within this
    /// many turns is dropped.
    pub weather_throttle_turns: u32,
    /// Collected calls beyond this count are dropped.
    pub max_collected_calls: usize,
    /// Metrics generated content may not adjust directly.
    pub protected_metrics: BTreeSet<String>,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            weather_throttle_turns: 2,
            max_collected_calls: 10,
            protected_metrics: BTreeSet::from(["glitch".to_owned()]),
        }
    }
}

/// Full configuration for one session's orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// When `false`, scripted content is used and no generator is called.
    pub generation_enabled: bool,
    /// When `false`, reactions skip the judge.
    pub semantic_validation_enabled: bool,
    /// Session seed for glitch rolls and the environment pass.
    pub seed: u64,
    /// Per-attempt generator timeout, in milliseconds.
    pub generator_timeout_ms: u64,
    /// Retries after the first timed-out attempt.
    pub generator_retries: u32,
    /// Checkpoint stack depth. At least two are kept.
    pub max_checkpoints: usize,
    /// Characters who react each turn.
    pub characters: Vec<String>,
    /// Per-turn call limits.
    pub rate_limits: RateLimits,
    /// Cross-source limits on collected calls.
    pub guardrails: GuardrailConfig,
    /// Metric bounds and glitch step.
    pub metrics: MetricPolicy,
    /// Win and loss thresholds.
    pub win_loss: WinLossRules,
    /// Recent events kept in state.
    pub recent_events_cap: usize,
    /// Longest speech a reaction may carry, in characters.
    pub max_speech_chars: usize,
    /// Flags with this prefix count as major events.
    pub major_event_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation_enabled: true,
            semantic_validation_enabled: true,
            seed: 0,
            generator_timeout_ms: 10_000,
            generator_retries: 2,
            max_checkpoints: 16,
            characters: vec!["Mira".to_owned(), "Oren".to_owned(), "Tamsin".to_owned()],
            rate_limits: RateLimits::default(),
            guardrails: GuardrailConfig::default(),
            metrics: MetricPolicy::default(),
            win_loss: WinLossRules::default(),
            recent_events_cap: 10,
            max_speech_chars: 200,
            major_event_prefix: "major_".to_owned(),
        }
    }
}

impl OrchestratorConfig {
    /// Per-attempt generator timeout.
    #[must_use]
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms)
    }

    /// The subset the rules engine needs.
    #[must_use]
    pub fn rules_config(&self) -> RulesConfig {
        RulesConfig {
            max_speech_chars: self.max_speech_chars,
            major_event_prefix: self.major_event_prefix.clone(),
            win_loss: self.win_loss.clone(),
        }
    }
}
