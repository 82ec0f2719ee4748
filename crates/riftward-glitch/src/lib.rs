//! Riftward — deterministic system anomalies.
//!
//! Each turn the glitch metric is rolled against a hash of the session seed,
//! the turn index, and the current glitch value. The outcome is a pure
//! function of those inputs plus the previous turn's glitch value, which
//! feeds the momentum check.

use riftward_core::state::metric;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Glitch level above which momentum is checked.
const MOMENTUM_FLOOR: i64 = 25;
/// Turn-over-turn increase that trips a momentum overload.
const MOMENTUM_JUMP: i64 = 10;

/// Which anomaly band a roll landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Glitch rose too fast; overrides the roll.
    MomentumOverload,
    /// Roll 0..=30.
    Cosmetic,
    /// Roll 31..=60.
    Medium,
    /// Roll 61..=84.
    Major,
    /// Roll 85..=100.
    CascadeOverload,
}

/// One metric change produced by an anomaly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlitchEffect {
    /// Metric to adjust.
    pub metric: &'static str,
    /// Requested delta.
    pub delta: i64,
}

/// The result of one glitch roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlitchOutcome {
    /// Hash roll in `0..=100`.
    pub roll: u8,
    /// Band the roll resolved to.
    pub kind: AnomalyKind,
    /// Metric effects, in application order.
    pub effects: Vec<GlitchEffect>,
    /// Whether the anomaly ends the game.
    pub triggered_loss: bool,
}

/// Hash roll for `(seed, turn, glitch)`, in `0..=100`.
#[must_use]
pub fn roll(seed: u64, turn: u32, glitch: i64) -> u8 {
    let digest = Sha256::digest(format!("{seed}:{turn}:{glitch}").as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    u8::try_from(head % 101).unwrap_or(100)
}

/// Resolves an anomaly. Identical inputs always yield identical outcomes.
#[must_use]
pub fn resolve(seed: u64, turn: u32, glitch: i64, previous: i64) -> GlitchOutcome {
    let roll = roll(seed, turn, glitch);
    let increase = glitch - previous;

    let (kind, effects, triggered_loss) = if glitch > MOMENTUM_FLOOR && increase > MOMENTUM_JUMP {
        (
            AnomalyKind::MomentumOverload,
            vec![effect(metric::GLITCH, 10)],
            true,
        )
    } else if roll <= 30 {
        (AnomalyKind::Cosmetic, vec![effect(metric::GLITCH, 1)], false)
    } else if roll <= 60 {
        (
            AnomalyKind::Medium,
            vec![
                effect(metric::ORDER, -3),
                effect(metric::MORALE, -2),
                effect(metric::GLITCH, 4),
            ],
            false,
        )
    } else if roll < 85 {
        (
            AnomalyKind::Major,
            vec![
                effect(metric::RESOURCES, -6),
                effect(metric::KNOWLEDGE, -5),
                effect(metric::GLITCH, 6),
            ],
            false,
        )
    } else {
        (
            AnomalyKind::CascadeOverload,
            vec![effect(metric::GLITCH, 15)],
            true,
        )
    };

    GlitchOutcome {
        roll,
        kind,
        effects,
        triggered_loss,
    }
}

fn effect(metric: &'static str, delta: i64) -> GlitchEffect {
    GlitchEffect { metric, delta }
}

/// Per-session glitch roller that remembers the previous turn's value.
#[derive(Debug, Clone)]
pub struct GlitchManager {
    seed: u64,
    previous: Option<i64>,
}

impl GlitchManager {
    /// Creates a manager for a session; `previous` is the glitch value
    /// recorded at the last roll, if any.
    #[must_use]
    pub fn new(seed: u64, previous: Option<i64>) -> Self {
        Self { seed, previous }
    }

    /// The glitch value seen at the last roll.
    #[must_use]
    pub fn previous(&self) -> Option<i64> {
        self.previous
    }

    /// Rolls for `turn` at glitch level `current`.
    ///
    /// Returns `None` without rolling or updating the tracked value when the
    /// game is already finalized.
    pub fn resolve_turn(&mut self, turn: u32, current: i64, finalized: bool) -> Option<GlitchOutcome> {
        if finalized {
            debug!(turn, "game finalized, skipping glitch roll");
            return None;
        }
        let previous = self.previous.unwrap_or(current);
        let outcome = resolve(self.seed, turn, current, previous);
        self.previous = Some(current);

        if outcome.triggered_loss {
            warn!(turn, roll = outcome.roll, kind = ?outcome.kind, "glitch triggered loss");
        } else {
            debug!(turn, roll = outcome.roll, kind = ?outcome.kind, "glitch resolved");
        }
        Some(outcome)
    }
}
