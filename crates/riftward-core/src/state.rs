//! Persisted game state.
//!
//! The state is owned by an external [`StateStore`](crate::store::StateStore);
//! the engine only ever holds deep copies of it for the duration of a turn.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Well-known metric names.
pub mod metric {
    /// Population morale.
    pub const MORALE: &str = "morale";
    /// Civic order.
    pub const ORDER: &str = "order";
    /// Stockpiled resources.
    pub const RESOURCES: &str = "resources";
    /// Accumulated knowledge.
    pub const KNOWLEDGE: &str = "knowledge";
    /// Corruption of the settlement.
    pub const CORRUPTION: &str = "corruption";
    /// The volatile system-anomaly metric.
    pub const GLITCH: &str = "glitch";
}

/// Inventory container that belongs to the player.
pub const PLAYER_CONTAINER: &str = "player";

/// One recorded metric mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricChange {
    /// Metric name.
    pub name: String,
    /// The delta actually applied after capping and clamping.
    pub delta: i64,
    /// The resulting value.
    pub value: i64,
    /// What caused the change.
    pub cause: String,
}

/// Named bounded integers plus the glitch carry-over buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSet {
    /// Current metric values.
    pub values: BTreeMap<String, i64>,
    /// Glitch delta that exceeded the per-turn cap and is waiting to be
    /// applied in a later turn.
    pub glitch_carry: i64,
    /// Net glitch movement applied so far in the turn being played. Zero
    /// between turns.
    pub glitch_moved: i64,
    /// Append-only change log.
    pub log: Vec<MetricChange>,
}

impl MetricSet {
    /// Builds a metric set from `(name, value)` pairs.
    pub fn from_values<'a>(values: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
            ..Self::default()
        }
    }

    /// Current value of a metric, `0` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> i64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    /// Closes the turn's glitch budget. Any carry-over stays buffered.
    pub fn close_turn(&mut self) {
        self.glitch_moved = 0;
    }
}

/// A timed status effect on a character or the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Who the status applies to.
    pub target: String,
    /// Status name.
    pub status: String,
    /// Remaining turns.
    pub duration: i64,
}

/// Per-character attributes adjusted by reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTraits {
    /// Rational disposition, 0..=100.
    pub logic: i64,
    /// Emotional disposition, 0..=100.
    pub emotion: i64,
}

impl Default for CharacterTraits {
    fn default() -> Self {
        Self {
            logic: 50,
            emotion: 50,
        }
    }
}

/// Atmosphere carried from one turn into the next turn's generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConstraint {
    /// Atmosphere line.
    pub atmosphere: String,
    /// Sensory details.
    pub sensory_details: String,
}

/// The most recent applied weather change, used for throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Atmosphere text that was applied.
    pub atmosphere: String,
    /// Turn on which it was applied.
    pub turn: u32,
}

/// Outcome class of a win/loss evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinLossStatus {
    /// The player won.
    Win,
    /// The player lost.
    Loss,
    /// The game continues.
    Ongoing,
}

/// A win/loss verdict with its reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLoss {
    /// Outcome class.
    pub status: WinLossStatus,
    /// Machine-readable reason.
    pub reason: String,
}

impl WinLoss {
    /// The game continues.
    #[must_use]
    pub fn ongoing() -> Self {
        Self {
            status: WinLossStatus::Ongoing,
            reason: "ongoing".to_owned(),
        }
    }

    /// A victory with the given reason.
    #[must_use]
    pub fn win(reason: impl Into<String>) -> Self {
        Self {
            status: WinLossStatus::Win,
            reason: reason.into(),
        }
    }

    /// A defeat with the given reason.
    #[must_use]
    pub fn loss(reason: impl Into<String>) -> Self {
        Self {
            status: WinLossStatus::Loss,
            reason: reason.into(),
        }
    }

    /// `true` unless the game is still ongoing.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status != WinLossStatus::Ongoing
    }
}

/// The full persisted game state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    /// Number of completed turns.
    pub turn: u32,
    /// Bounded metrics.
    pub metrics: MetricSet,
    /// Active story flags.
    pub flags: BTreeSet<String>,
    /// Trust per character, -5..=5.
    pub npc_trust: BTreeMap<String, i64>,
    /// Logic/emotion per character.
    pub characters: BTreeMap<String, CharacterTraits>,
    /// Item ids per named container.
    pub inventory: BTreeMap<String, Vec<String>>,
    /// Active status effects.
    pub status_effects: Vec<StatusEffect>,
    /// Most recent event summaries, newest last.
    pub recent_events: Vec<String>,
    /// Atmosphere from the previous turn's world generation.
    pub world_constraint_from_prev_turn: Option<WorldConstraint>,
    /// Last applied weather change.
    pub last_weather: Option<WeatherRecord>,
    /// Number of resolved choices whose action type was `risk`.
    pub risk_count: u32,
    /// Number of major-event flags raised.
    pub major_event_count: u32,
    /// Turn on which the last major event was raised.
    pub last_major_event_turn: Option<u32>,
    /// Human-readable trust summary.
    pub relationship_summary: String,
    /// Glitch value at the end of the previous turn.
    pub previous_glitch: Option<i64>,
    /// Set once the game has reached a terminal verdict.
    pub verdict: Option<WinLoss>,
}

impl GameState {
    /// A fresh session with the standard starting metrics.
    #[must_use]
    pub fn new_session() -> Self {
        Self {
            metrics: MetricSet::from_values([
                (metric::MORALE, 60),
                (metric::ORDER, 60),
                (metric::RESOURCES, 60),
                (metric::KNOWLEDGE, 40),
                (metric::CORRUPTION, 10),
                (metric::GLITCH, 5),
            ]),
            ..Self::default()
        }
    }

    /// `true` once a terminal verdict has been recorded.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.verdict.as_ref().is_some_and(WinLoss::is_terminal)
    }

    /// Trust toward a character, `0` when unknown.
    #[must_use]
    pub fn trust(&self, character: &str) -> i64 {
        self.npc_trust.get(character).copied().unwrap_or(0)
    }

    /// Items held in a container.
    #[must_use]
    pub fn container(&self, name: &str) -> &[String] {
        self.inventory.get(name).map_or(&[], Vec::as_slice)
    }

    /// Appends an event summary, keeping at most `cap` entries.
    pub fn push_recent_event(&mut self, summary: impl Into<String>, cap: usize) {
        self.recent_events.push(summary.into());
        if self.recent_events.len() > cap {
            let excess = self.recent_events.len() - cap;
            self.recent_events.drain(..excess);
        }
    }
}
