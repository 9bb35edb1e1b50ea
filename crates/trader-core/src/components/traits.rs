//! Personality Traits
//!
//! A fixed schema of twelve traits in [0, 100], the archetype derived from
//! them, and the bounded evolution rule that lets experience reshape them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use trader_events::SimTime;

use crate::config::TraitTuning;
use crate::error::{CoreError, Result};

pub const TRAIT_COUNT: usize = 12;

/// Value every trait starts at unless specified
pub const DEFAULT_TRAIT_VALUE: f64 = 50.0;

/// Identifier of a personality trait
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitId {
    RiskTolerance,
    Fear,
    Greed,
    Confidence,
    Patience,
    Sociability,
    Analytical,
    Neuroticism,
    Discipline,
    Loyalty,
    Curiosity,
    Adaptability,
}

impl TraitId {
    pub const ALL: [TraitId; TRAIT_COUNT] = [
        TraitId::RiskTolerance,
        TraitId::Fear,
        TraitId::Greed,
        TraitId::Confidence,
        TraitId::Patience,
        TraitId::Sociability,
        TraitId::Analytical,
        TraitId::Neuroticism,
        TraitId::Discipline,
        TraitId::Loyalty,
        TraitId::Curiosity,
        TraitId::Adaptability,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TraitId::RiskTolerance => "risk_tolerance",
            TraitId::Fear => "fear",
            TraitId::Greed => "greed",
            TraitId::Confidence => "confidence",
            TraitId::Patience => "patience",
            TraitId::Sociability => "sociability",
            TraitId::Analytical => "analytical",
            TraitId::Neuroticism => "neuroticism",
            TraitId::Discipline => "discipline",
            TraitId::Loyalty => "loyalty",
            TraitId::Curiosity => "curiosity",
            TraitId::Adaptability => "adaptability",
        }
    }
}

impl fmt::Display for TraitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraitId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        TraitId::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTrait(s.to_string()))
    }
}

/// Dense trait vector. Serialized as a map so files stay readable; loading
/// fails if a trait is missing, unknown or out of range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "BTreeMap<TraitId, f64>", try_from = "BTreeMap<TraitId, f64>")]
pub struct TraitVector {
    values: [f64; TRAIT_COUNT],
}

impl Default for TraitVector {
    fn default() -> Self {
        Self {
            values: [DEFAULT_TRAIT_VALUE; TRAIT_COUNT],
        }
    }
}

impl TraitVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with the given overrides applied.
    pub fn from_pairs(pairs: &[(TraitId, f64)]) -> Result<Self> {
        let mut vector = Self::default();
        for &(id, value) in pairs {
            vector.set(id, value)?;
        }
        Ok(vector)
    }

    pub fn get(&self, id: TraitId) -> f64 {
        self.values[id.index()]
    }

    /// Lookup by name; unknown names are an input error.
    pub fn get_by_name(&self, name: &str) -> Result<f64> {
        Ok(self.get(name.parse()?))
    }

    pub fn set(&mut self, id: TraitId, value: f64) -> Result<()> {
        CoreError::check_bounds(id.as_str(), value, 0.0, 100.0)?;
        self.values[id.index()] = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TraitId, f64)> + '_ {
        TraitId::ALL.iter().map(move |&id| (id, self.get(id)))
    }

    /// Normalized signed value in [-1, 1] around the default.
    pub fn centered(&self, id: TraitId) -> f64 {
        (self.get(id) - DEFAULT_TRAIT_VALUE) / DEFAULT_TRAIT_VALUE
    }
}

impl From<TraitVector> for BTreeMap<TraitId, f64> {
    fn from(vector: TraitVector) -> Self {
        vector.iter().collect()
    }
}

impl TryFrom<BTreeMap<TraitId, f64>> for TraitVector {
    type Error = String;

    fn try_from(map: BTreeMap<TraitId, f64>) -> std::result::Result<Self, Self::Error> {
        let mut vector = TraitVector::default();
        for id in TraitId::ALL {
            let value = map
                .get(&id)
                .copied()
                .ok_or_else(|| format!("missing trait {}", id))?;
            vector.set(id, value).map_err(|e| e.to_string())?;
        }
        Ok(vector)
    }
}

/// Discrete label derived from the trait vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Analyst,
    Gambler,
    Guardian,
    Hustler,
    Networker,
    Opportunist,
    Strategist,
    Survivor,
}

/// Scoring coefficients per archetype, applied to centered trait values.
/// Listed in lexicographic label order, which is also the tie-break order.
const ARCHETYPE_COEFFICIENTS: [(Archetype, &[(TraitId, f64)]); 8] = [
    (
        Archetype::Analyst,
        &[
            (TraitId::Analytical, 1.0),
            (TraitId::Patience, 0.5),
            (TraitId::Discipline, 0.4),
            (TraitId::Greed, -0.3),
        ],
    ),
    (
        Archetype::Gambler,
        &[
            (TraitId::RiskTolerance, 1.0),
            (TraitId::Greed, 0.6),
            (TraitId::Discipline, -0.5),
            (TraitId::Fear, -0.4),
        ],
    ),
    (
        Archetype::Guardian,
        &[
            (TraitId::RiskTolerance, -0.8),
            (TraitId::Fear, 0.6),
            (TraitId::Discipline, 0.6),
            (TraitId::Loyalty, 0.3),
        ],
    ),
    (
        Archetype::Hustler,
        &[
            (TraitId::Greed, 0.8),
            (TraitId::Patience, -0.6),
            (TraitId::Sociability, 0.5),
            (TraitId::Confidence, 0.3),
        ],
    ),
    (
        Archetype::Networker,
        &[
            (TraitId::Sociability, 1.0),
            (TraitId::Loyalty, 0.6),
            (TraitId::Curiosity, 0.3),
        ],
    ),
    (
        Archetype::Opportunist,
        &[
            (TraitId::Adaptability, 0.8),
            (TraitId::Curiosity, 0.5),
            (TraitId::Loyalty, -0.5),
            (TraitId::Greed, 0.4),
        ],
    ),
    (
        Archetype::Strategist,
        &[
            (TraitId::Patience, 0.8),
            (TraitId::Confidence, 0.5),
            (TraitId::Analytical, 0.4),
            (TraitId::Neuroticism, -0.4),
        ],
    ),
    (
        Archetype::Survivor,
        &[
            (TraitId::Neuroticism, 0.6),
            (TraitId::Fear, 0.5),
            (TraitId::Adaptability, 0.5),
            (TraitId::Confidence, -0.4),
        ],
    ),
];

impl Archetype {
    pub fn as_str(self) -> &'static str {
        match self {
            Archetype::Analyst => "analyst",
            Archetype::Gambler => "gambler",
            Archetype::Guardian => "guardian",
            Archetype::Hustler => "hustler",
            Archetype::Networker => "networker",
            Archetype::Opportunist => "opportunist",
            Archetype::Strategist => "strategist",
            Archetype::Survivor => "survivor",
        }
    }

    /// Score of every archetype for the given traits, in tie-break order.
    pub fn scores(traits: &TraitVector) -> Vec<(Archetype, f64)> {
        ARCHETYPE_COEFFICIENTS
            .iter()
            .map(|(archetype, coefficients)| {
                let score = coefficients
                    .iter()
                    .map(|&(id, weight)| weight * traits.centered(id))
                    .sum();
                (*archetype, score)
            })
            .collect()
    }

    /// Highest-scoring archetype; ties go to the lexicographically first label.
    pub fn classify(traits: &TraitVector) -> Archetype {
        let mut best = (Archetype::Analyst, f64::NEG_INFINITY);
        for (archetype, score) in Self::scores(traits) {
            if score > best.1 {
                best = (archetype, score);
            }
        }
        best.0
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of experience that can reshape personality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionTrigger {
    BigWin,
    BigLoss,
    Betrayal,
    Cooperation,
    Surprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitEventOutcome {
    Favorable,
    Unfavorable,
}

/// One personality-evolution event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitEvent {
    pub trigger: EvolutionTrigger,
    pub outcome: TraitEventOutcome,
    /// 0 to 100
    pub intensity: f64,
}

impl TraitEvent {
    pub fn new(trigger: EvolutionTrigger, outcome: TraitEventOutcome, intensity: f64) -> Self {
        Self {
            trigger,
            outcome,
            intensity,
        }
    }
}

/// Trait deltas at full intensity. The outcome only selects the row for
/// surprises; the other triggers carry their own direction.
fn trigger_deltas(trigger: EvolutionTrigger, outcome: TraitEventOutcome) -> &'static [(TraitId, f64)] {
    match (trigger, outcome) {
        (EvolutionTrigger::BigWin, _) => &[
            (TraitId::Confidence, 1.5),
            (TraitId::RiskTolerance, 1.0),
            (TraitId::Greed, 0.5),
            (TraitId::Fear, -0.5),
        ],
        (EvolutionTrigger::BigLoss, _) => &[
            (TraitId::Confidence, -1.5),
            (TraitId::Fear, 1.5),
            (TraitId::RiskTolerance, -1.0),
            (TraitId::Neuroticism, 0.5),
        ],
        (EvolutionTrigger::Betrayal, _) => &[
            (TraitId::Loyalty, -2.0),
            (TraitId::Sociability, -1.0),
            (TraitId::Fear, 1.0),
            (TraitId::Neuroticism, 1.0),
        ],
        (EvolutionTrigger::Cooperation, _) => &[
            (TraitId::Loyalty, 1.0),
            (TraitId::Sociability, 1.0),
            (TraitId::Neuroticism, -0.5),
        ],
        (EvolutionTrigger::Surprise, TraitEventOutcome::Favorable) => &[
            (TraitId::Curiosity, 1.0),
            (TraitId::Adaptability, 1.0),
        ],
        (EvolutionTrigger::Surprise, TraitEventOutcome::Unfavorable) => &[
            (TraitId::Adaptability, 1.0),
            (TraitId::Analytical, 0.5),
            (TraitId::Fear, 0.5),
        ],
    }
}

/// A single applied trait change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitChange {
    pub trait_id: TraitId,
    pub before: f64,
    pub after: f64,
}

/// Current traits plus the values they started from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraitStore {
    pub current: TraitVector,
    pub initial: TraitVector,
    /// Signed movement per trait within `drift_tick`
    tick_drift: [f64; TRAIT_COUNT],
    drift_tick: SimTime,
}

impl TraitStore {
    pub fn new(initial: TraitVector) -> Self {
        Self {
            current: initial.clone(),
            initial,
            tick_drift: [0.0; TRAIT_COUNT],
            drift_tick: SimTime::ZERO,
        }
    }

    /// Movement of a trait so far in the tick of the last evolution.
    pub fn drift_this_tick(&self, id: TraitId, now: SimTime) -> f64 {
        if now == self.drift_tick {
            self.tick_drift[id.index()]
        } else {
            0.0
        }
    }

    /// Per-tick drift bookkeeping is within `cap`.
    pub fn is_tick_drift_within(&self, cap: f64) -> bool {
        self.tick_drift.iter().all(|d| d.is_finite() && d.abs() <= cap + 1e-9)
    }

    pub fn get(&self, id: TraitId) -> f64 {
        self.current.get(id)
    }

    pub fn archetype(&self) -> Archetype {
        Archetype::classify(&self.current)
    }

    /// Absolute drift of a trait from its initial value.
    pub fn drift(&self, id: TraitId) -> f64 {
        (self.current.get(id) - self.initial.get(id)).abs()
    }

    /// Apply a batch of evolution events at `now`.
    ///
    /// The total movement of a trait within one tick is capped, however many
    /// calls land in it; the result is then clipped to the lifetime band
    /// around the initial value. Clipping is silent: hitting the band is the
    /// intended behavior, not an error.
    pub fn evolve(&mut self, events: &[TraitEvent], tuning: &TraitTuning, enabled: bool, now: SimTime) -> Vec<TraitChange> {
        if !enabled || events.is_empty() {
            return Vec::new();
        }
        if now != self.drift_tick {
            self.tick_drift = [0.0; TRAIT_COUNT];
            self.drift_tick = now;
        }
        let cap = tuning.per_tick_cap.max(0.0);
        let lifetime = tuning.lifetime_cap.max(0.0);

        let mut pending = [0.0f64; TRAIT_COUNT];
        for event in events {
            let scale = event.intensity.clamp(0.0, 100.0) / 100.0;
            for &(id, delta) in trigger_deltas(event.trigger, event.outcome) {
                pending[id.index()] += delta * scale;
            }
        }

        let mut changes = Vec::new();
        for id in TraitId::ALL {
            let spent = self.tick_drift[id.index()];
            let delta = pending[id.index()].clamp(-cap - spent, cap - spent);
            if delta == 0.0 {
                continue;
            }
            let before = self.current.get(id);
            let anchor = self.initial.get(id);
            let after = (before + delta)
                .clamp(anchor - lifetime, anchor + lifetime)
                .clamp(0.0, 100.0);
            if after != before {
                self.current.values[id.index()] = after;
                self.tick_drift[id.index()] += after - before;
                changes.push(TraitChange {
                    trait_id: id,
                    before,
                    after,
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_trait_name_is_error() {
        let traits = TraitVector::new();
        assert_eq!(traits.get_by_name("fear").unwrap(), 50.0);
        assert!(matches!(
            traits.get_by_name("charisma"),
            Err(CoreError::UnknownTrait(name)) if name == "charisma"
        ));
    }

    #[test]
    fn test_set_rejects_out_of_range() {
        let mut traits = TraitVector::new();
        assert!(traits.set(TraitId::Greed, 101.0).is_err());
        assert!(traits.set(TraitId::Greed, -0.5).is_err());
        assert_eq!(traits.get(TraitId::Greed), 50.0);
    }

    #[test]
    fn test_default_archetype_tie_breaks_lexicographically() {
        assert_eq!(Archetype::classify(&TraitVector::new()), Archetype::Analyst);
    }

    #[test]
    fn test_archetype_follows_traits() {
        let gambler = TraitVector::from_pairs(&[
            (TraitId::RiskTolerance, 95.0),
            (TraitId::Greed, 85.0),
            (TraitId::Discipline, 20.0),
        ])
        .unwrap();
        assert_eq!(Archetype::classify(&gambler), Archetype::Gambler);

        let networker = TraitVector::from_pairs(&[
            (TraitId::Sociability, 95.0),
            (TraitId::Loyalty, 85.0),
        ])
        .unwrap();
        assert_eq!(Archetype::classify(&networker), Archetype::Networker);
    }

    #[test]
    fn test_serde_map_round_trip_and_rejections() {
        let traits = TraitVector::from_pairs(&[(TraitId::Fear, 20.0)]).unwrap();
        let json = serde_json::to_string(&traits).unwrap();
        assert!(json.starts_with("{\"risk_tolerance\":50"));
        let back: TraitVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, traits);

        let unknown = json.replace("\"fear\"", "\"charisma\"");
        assert!(serde_json::from_str::<TraitVector>(&unknown).is_err());

        let out_of_range = json.replace("\"fear\":20.0", "\"fear\":200.0");
        assert!(serde_json::from_str::<TraitVector>(&out_of_range).is_err());
    }

    #[test]
    fn test_evolve_caps_per_call_drift() {
        let mut store = TraitStore::new(TraitVector::new());
        let events = vec![
            TraitEvent::new(EvolutionTrigger::Betrayal, TraitEventOutcome::Unfavorable, 100.0);
            5
        ];
        let changes = store.evolve(&events, &TraitTuning::default(), true, SimTime::new(1));
        assert!(!changes.is_empty());
        for change in &changes {
            assert!((change.after - change.before).abs() <= 2.0 + 1e-9);
        }
        assert_eq!(store.get(TraitId::Loyalty), 48.0);
    }

    #[test]
    fn test_evolve_caps_drift_across_calls_in_one_tick() {
        let mut store = TraitStore::new(TraitVector::new());
        let tuning = TraitTuning::default();
        let event = TraitEvent::new(EvolutionTrigger::BigLoss, TraitEventOutcome::Unfavorable, 100.0);
        let now = SimTime::new(5);
        for _ in 0..4 {
            store.evolve(&[event], &tuning, true, now);
        }
        for id in TraitId::ALL {
            assert!(store.drift(id) <= tuning.per_tick_cap + 1e-9, "{} moved {}", id, store.drift(id));
        }
        assert!(store.drift_this_tick(TraitId::Fear, now) > 0.0);

        let fear = store.get(TraitId::Fear);
        store.evolve(&[event], &tuning, true, SimTime::new(6));
        assert!(store.get(TraitId::Fear) > fear, "a new tick brings a fresh allowance");
        assert_eq!(store.drift_this_tick(TraitId::Fear, SimTime::new(5)), 0.0);
    }

    #[test]
    fn test_evolve_respects_lifetime_clamp() {
        let mut store = TraitStore::new(TraitVector::new());
        let tuning = TraitTuning::default();
        let event = TraitEvent::new(EvolutionTrigger::BigLoss, TraitEventOutcome::Unfavorable, 100.0);
        for tick in 0..100 {
            store.evolve(&[event], &tuning, true, SimTime::new(tick));
        }
        assert_eq!(store.get(TraitId::Fear), 70.0);
        assert_eq!(store.get(TraitId::Confidence), 30.0);
        for id in TraitId::ALL {
            assert!(store.drift(id) <= tuning.lifetime_cap + 1e-9);
        }
    }

    #[test]
    fn test_evolve_disabled_is_noop() {
        let mut store = TraitStore::new(TraitVector::new());
        let event = TraitEvent::new(EvolutionTrigger::BigWin, TraitEventOutcome::Favorable, 100.0);
        assert!(store.evolve(&[event], &TraitTuning::default(), false, SimTime::ZERO).is_empty());
        assert_eq!(store.current, store.initial);
    }
}
