//! Emotion Engine
//!
//! Dimensional affect (valence, arousal, dominance) plus named categorical
//! emotions, each decaying on its own half-life, with a depletable
//! regulation budget for down-regulating whatever dominates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use trader_events::{Action, SimTime};

use crate::components::traits::{TraitId, TraitVector};
use crate::config::EmotionTuning;
use crate::error::{CoreError, Result};

pub const BASELINE_VALENCE: f64 = 0.0;
pub const BASELINE_AROUSAL: f64 = 30.0;
pub const BASELINE_DOMINANCE: f64 = 0.0;
pub const MAX_BUDGET: f64 = 100.0;

/// Regulation episodes kept for attribution at the next outcome
const PENDING_REGULATION_LIMIT: usize = 16;

/// Named categorical emotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionKind {
    Joy,
    Sadness,
    Fear,
    Anger,
    Panic,
    Fomo,
    Regret,
    Excitement,
    Pride,
}

impl EmotionKind {
    pub const ALL: [EmotionKind; 9] = [
        EmotionKind::Joy,
        EmotionKind::Sadness,
        EmotionKind::Fear,
        EmotionKind::Anger,
        EmotionKind::Panic,
        EmotionKind::Fomo,
        EmotionKind::Regret,
        EmotionKind::Excitement,
        EmotionKind::Pride,
    ];

    /// Half-life in ticks. Panic burns out fast, regret lingers.
    pub fn half_life(self) -> f64 {
        match self {
            EmotionKind::Panic => 2.0,
            EmotionKind::Fomo | EmotionKind::Excitement => 4.0,
            EmotionKind::Fear => 6.0,
            EmotionKind::Anger => 8.0,
            EmotionKind::Joy => 12.0,
            EmotionKind::Pride | EmotionKind::Sadness => 24.0,
            EmotionKind::Regret => 72.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionKind::Joy => "joy",
            EmotionKind::Sadness => "sadness",
            EmotionKind::Fear => "fear",
            EmotionKind::Anger => "anger",
            EmotionKind::Panic => "panic",
            EmotionKind::Fomo => "fomo",
            EmotionKind::Regret => "regret",
            EmotionKind::Excitement => "excitement",
            EmotionKind::Pride => "pride",
        }
    }
}

impl fmt::Display for EmotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionPhase {
    #[default]
    Baseline,
    Aroused,
    Regulating,
}

/// Events the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionEventKind {
    ProfitableTrade,
    LosingTrade,
    Betrayal,
    Cooperation,
    MarketVolatility,
    MissedOpportunity,
    UnexpectedOutcome,
    Milestone,
}

struct Impact {
    valence: f64,
    arousal: f64,
    dominance: f64,
    categorical: &'static [(EmotionKind, f64)],
}

impl EmotionEventKind {
    fn impact(self) -> Impact {
        use EmotionKind::*;
        match self {
            EmotionEventKind::ProfitableTrade => Impact {
                valence: 30.0,
                arousal: 15.0,
                dominance: 15.0,
                categorical: &[(Joy, 40.0), (Pride, 20.0), (Excitement, 15.0)],
            },
            EmotionEventKind::LosingTrade => Impact {
                valence: -30.0,
                arousal: 20.0,
                dominance: -15.0,
                categorical: &[(Sadness, 30.0), (Regret, 25.0), (Fear, 15.0)],
            },
            EmotionEventKind::Betrayal => Impact {
                valence: -45.0,
                arousal: 35.0,
                dominance: -20.0,
                categorical: &[(Anger, 50.0), (Sadness, 25.0), (Fear, 20.0)],
            },
            EmotionEventKind::Cooperation => Impact {
                valence: 20.0,
                arousal: 5.0,
                dominance: 10.0,
                categorical: &[(Joy, 25.0), (Pride, 10.0)],
            },
            EmotionEventKind::MarketVolatility => Impact {
                valence: -10.0,
                arousal: 30.0,
                dominance: -10.0,
                categorical: &[(Fear, 30.0), (Panic, 20.0), (Fomo, 15.0), (Excitement, 10.0)],
            },
            EmotionEventKind::MissedOpportunity => Impact {
                valence: -15.0,
                arousal: 15.0,
                dominance: -5.0,
                categorical: &[(Regret, 35.0), (Fomo, 30.0)],
            },
            EmotionEventKind::UnexpectedOutcome => Impact {
                valence: 0.0,
                arousal: 25.0,
                dominance: -10.0,
                categorical: &[(Fear, 10.0), (Excitement, 20.0)],
            },
            EmotionEventKind::Milestone => Impact {
                valence: 25.0,
                arousal: 10.0,
                dominance: 20.0,
                categorical: &[(Pride, 40.0), (Joy, 20.0)],
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionEventKind::ProfitableTrade => "profitable_trade",
            EmotionEventKind::LosingTrade => "losing_trade",
            EmotionEventKind::Betrayal => "betrayal",
            EmotionEventKind::Cooperation => "cooperation",
            EmotionEventKind::MarketVolatility => "market_volatility",
            EmotionEventKind::MissedOpportunity => "missed_opportunity",
            EmotionEventKind::UnexpectedOutcome => "unexpected_outcome",
            EmotionEventKind::Milestone => "milestone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionEvent {
    pub kind: EmotionEventKind,
    /// Scales the impact table; 100 applies it in full
    pub intensity: f64,
}

impl EmotionEvent {
    pub fn new(kind: EmotionEventKind, intensity: f64) -> Self {
        Self { kind, intensity }
    }
}

/// Trait-derived multipliers for event impacts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
    pub threat: f64,
    pub appetite: f64,
}

impl Modulation {
    pub fn from_traits(traits: &TraitVector) -> Self {
        Self {
            valence: 0.5 + traits.get(TraitId::Neuroticism) / 100.0,
            arousal: 0.75 + (100.0 - traits.get(TraitId::Discipline)) / 200.0,
            dominance: 0.5 + traits.get(TraitId::Confidence) / 100.0,
            threat: 0.5 + traits.get(TraitId::Fear) / 100.0,
            appetite: 0.5 + traits.get(TraitId::Greed) / 100.0,
        }
    }

    fn categorical(&self, kind: EmotionKind) -> f64 {
        match kind {
            EmotionKind::Fear | EmotionKind::Panic => self.threat,
            EmotionKind::Fomo | EmotionKind::Excitement => self.appetite,
            _ => self.valence,
        }
    }
}

/// Ways of down-regulating a dominant emotion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationStrategy {
    Reappraisal,
    Suppression,
    Distraction,
}

impl RegulationStrategy {
    pub fn base_efficiency(self) -> f64 {
        match self {
            RegulationStrategy::Reappraisal => 1.6,
            RegulationStrategy::Suppression => 1.2,
            RegulationStrategy::Distraction => 1.0,
        }
    }

    pub fn for_traits(traits: &TraitVector) -> Self {
        if traits.get(TraitId::Analytical) >= 60.0 {
            RegulationStrategy::Reappraisal
        } else if traits.get(TraitId::Discipline) >= 60.0 {
            RegulationStrategy::Suppression
        } else {
            RegulationStrategy::Distraction
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegulationStrategy::Reappraisal => "reappraisal",
            RegulationStrategy::Suppression => "suppression",
            RegulationStrategy::Distraction => "distraction",
        }
    }
}

/// Record of one regulation episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegulationRecord {
    pub emotion: EmotionKind,
    pub strategy: RegulationStrategy,
    pub before: f64,
    pub after: f64,
    pub cost: f64,
    pub at: SimTime,
}

/// Result of processing an event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmotionUpdate {
    pub phase: EmotionPhase,
    pub reasoning: Vec<String>,
}

/// How emotion bends a decision draft
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionalInfluence {
    pub confidence_adjustment: f64,
    pub risk_adjustment: f64,
    pub timing_adjustment: f64,
    /// Action forced by an overwhelming emotion
    pub override_action: Option<Action>,
    pub reasoning: Vec<String>,
}

impl EmotionalInfluence {
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn emotional_override(&self) -> bool {
        self.override_action.is_some()
    }
}

fn default_effectiveness() -> BTreeMap<RegulationStrategy, f64> {
    [
        RegulationStrategy::Reappraisal,
        RegulationStrategy::Suppression,
        RegulationStrategy::Distraction,
    ]
    .into_iter()
    .map(|s| (s, 1.0))
    .collect()
}

fn default_categorical() -> BTreeMap<EmotionKind, f64> {
    EmotionKind::ALL.into_iter().map(|k| (k, 0.0)).collect()
}

/// Complete emotional state of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmotionState {
    /// -100 to 100
    pub valence: f64,
    /// 0 to 100
    pub arousal: f64,
    /// -100 to 100
    pub dominance: f64,
    pub categorical: BTreeMap<EmotionKind, f64>,
    pub regulation_budget: f64,
    pub phase: EmotionPhase,
    /// Learned multiplier per regulation strategy, 0.5 to 1.5
    pub effectiveness: BTreeMap<RegulationStrategy, f64>,
    /// Regulation episodes not yet attributed to an outcome
    pub pending_regulations: Vec<RegulationRecord>,
    pub last_update: SimTime,
}

impl Default for EmotionState {
    fn default() -> Self {
        Self {
            valence: BASELINE_VALENCE,
            arousal: BASELINE_AROUSAL,
            dominance: BASELINE_DOMINANCE,
            categorical: default_categorical(),
            regulation_budget: MAX_BUDGET,
            phase: EmotionPhase::Baseline,
            effectiveness: default_effectiveness(),
            pending_regulations: Vec::new(),
            last_update: SimTime::ZERO,
        }
    }
}

impl EmotionState {
    pub fn new(now: SimTime) -> Self {
        Self {
            last_update: now,
            ..Self::default()
        }
    }

    pub fn intensity(&self, kind: EmotionKind) -> f64 {
        self.categorical.get(&kind).copied().unwrap_or(0.0)
    }

    /// Sets a categorical intensity directly, e.g. to seed a scenario.
    pub fn set_intensity(&mut self, kind: EmotionKind, value: f64, tuning: &EmotionTuning) -> Result<()> {
        CoreError::check_bounds(kind.as_str(), value, 0.0, 100.0)?;
        self.categorical.insert(kind, value);
        self.refresh_phase(tuning);
        Ok(())
    }

    /// Strongest categorical emotion; ties go to the earlier kind.
    pub fn dominant(&self) -> Option<(EmotionKind, f64)> {
        let mut best: Option<(EmotionKind, f64)> = None;
        for kind in EmotionKind::ALL {
            let value = self.intensity(kind);
            if value > 0.0 && best.map_or(true, |(_, b)| value > b) {
                best = Some((kind, value));
            }
        }
        best
    }

    /// 100 when no conflicting pair is active together.
    pub fn coherence(&self) -> f64 {
        let joy_sadness = self.intensity(EmotionKind::Joy).min(self.intensity(EmotionKind::Sadness));
        let fear_anger = self.intensity(EmotionKind::Fear).min(self.intensity(EmotionKind::Anger));
        (100.0 - (joy_sadness + fear_anger)).clamp(0.0, 100.0)
    }

    fn refresh_phase(&mut self, tuning: &EmotionTuning) {
        let aroused = self.categorical.values().any(|&v| v > tuning.arousal_threshold);
        if aroused && self.phase == EmotionPhase::Baseline {
            self.phase = EmotionPhase::Aroused;
        }
    }

    /// Applies an event, modulated by personality.
    pub fn process(&mut self, event: EmotionEvent, traits: &TraitVector, tuning: &EmotionTuning) -> Result<EmotionUpdate> {
        CoreError::check_bounds("intensity", event.intensity, 0.0, 100.0)?;
        let impact = event.kind.impact();
        let modulation = Modulation::from_traits(traits);
        let scale = event.intensity / 100.0;

        let dv = impact.valence * scale * modulation.valence;
        let da = impact.arousal * scale * modulation.arousal;
        let dd = impact.dominance * scale * modulation.dominance;
        self.valence = (self.valence + dv).clamp(-100.0, 100.0);
        self.arousal = (self.arousal + da).clamp(0.0, 100.0);
        self.dominance = (self.dominance + dd).clamp(-100.0, 100.0);

        let mut triggered = Vec::new();
        for &(kind, base) in impact.categorical {
            let delta = base * scale * modulation.categorical(kind);
            let value = (self.intensity(kind) + delta).clamp(0.0, 100.0);
            self.categorical.insert(kind, value);
            triggered.push(format!("{} {:.0}", kind, value));
        }
        self.refresh_phase(tuning);

        let mut reasoning = vec![format!(
            "{}: valence {:+.1}, arousal {:+.1}, dominance {:+.1}",
            event.kind.as_str(),
            dv,
            da,
            dd
        )];
        if !triggered.is_empty() {
            reasoning.push(format!("felt {}", triggered.join(", ")));
        }
        Ok(EmotionUpdate {
            phase: self.phase,
            reasoning,
        })
    }

    /// Decays everything by `ticks`: categoricals on their half-lives,
    /// dimensions toward baseline, budget back toward full.
    pub fn decay(&mut self, ticks: u64, tuning: &EmotionTuning) {
        if ticks == 0 {
            return;
        }
        let dt = ticks as f64;
        for kind in EmotionKind::ALL {
            let value = self.intensity(kind) * 0.5f64.powf(dt / kind.half_life());
            self.categorical.insert(kind, value.max(0.0));
        }

        let drift = 0.5f64.powf(dt / tuning.dimension_half_life.max(f64::MIN_POSITIVE));
        self.valence = BASELINE_VALENCE + (self.valence - BASELINE_VALENCE) * drift;
        self.arousal = BASELINE_AROUSAL + (self.arousal - BASELINE_AROUSAL) * drift;
        self.dominance = BASELINE_DOMINANCE + (self.dominance - BASELINE_DOMINANCE) * drift;

        self.regulation_budget = (self.regulation_budget + tuning.budget_recovery_per_tick * dt).min(MAX_BUDGET);

        let aroused = self.categorical.values().any(|&v| v > tuning.arousal_threshold);
        self.phase = if aroused {
            EmotionPhase::Aroused
        } else {
            EmotionPhase::Baseline
        };
    }

    /// Decays up to `now`. Time never runs backwards.
    pub fn advance_to(&mut self, now: SimTime, tuning: &EmotionTuning) {
        let ticks = now.ticks_since(self.last_update);
        self.decay(ticks, tuning);
        if now > self.last_update {
            self.last_update = now;
        }
    }

    /// Down-regulates the dominant emotion if it is overwhelming and the
    /// budget allows. An exhausted budget means no regulation at all.
    pub fn regulate(&mut self, traits: &TraitVector, tuning: &EmotionTuning, now: SimTime) -> Option<RegulationRecord> {
        let (emotion, before) = self.dominant()?;
        if before <= tuning.arousal_threshold || self.regulation_budget <= tuning.regulation_min_budget {
            return None;
        }

        let strategy = RegulationStrategy::for_traits(traits);
        let learned = self.effectiveness.get(&strategy).copied().unwrap_or(1.0);
        let cost = tuning.regulation_cost.min(self.regulation_budget);
        let reduction = cost * strategy.base_efficiency() * learned;
        let after = (before - reduction).max(0.0);

        self.categorical.insert(emotion, after);
        self.regulation_budget = (self.regulation_budget - cost).max(0.0);
        self.phase = EmotionPhase::Regulating;

        let record = RegulationRecord {
            emotion,
            strategy,
            before,
            after,
            cost,
            at: now,
        };
        self.pending_regulations.push(record);
        if self.pending_regulations.len() > PENDING_REGULATION_LIMIT {
            self.pending_regulations.remove(0);
        }
        Some(record)
    }

    /// Credits or blames the regulation strategies used since the last
    /// outcome. Returns the strategies that were updated.
    pub fn learn_regulation(&mut self, success: bool) -> Vec<RegulationStrategy> {
        let target = if success { 1.5 } else { 0.5 };
        let mut updated = Vec::new();
        for record in std::mem::take(&mut self.pending_regulations) {
            let entry = self.effectiveness.entry(record.strategy).or_insert(1.0);
            *entry = (*entry * 0.8 + target * 0.2).clamp(0.5, 1.5);
            if !updated.contains(&record.strategy) {
                updated.push(record.strategy);
            }
        }
        updated
    }

    /// Back to baseline with a full budget. Learned effectiveness survives.
    pub fn reset(&mut self) {
        self.valence = BASELINE_VALENCE;
        self.arousal = BASELINE_AROUSAL;
        self.dominance = BASELINE_DOMINANCE;
        self.categorical = default_categorical();
        self.regulation_budget = MAX_BUDGET;
        self.phase = EmotionPhase::Baseline;
        self.pending_regulations.clear();
    }

    /// How the current state bends a draft decision. Pure.
    pub fn decision_impact(&self, draft: Action, tuning: &EmotionTuning) -> EmotionalInfluence {
        let mut influence = EmotionalInfluence::neutral();
        influence.confidence_adjustment += self.valence * 0.05 + self.dominance * 0.05;

        let fear = self.intensity(EmotionKind::Fear);
        if fear > 40.0 {
            influence.risk_adjustment -= (fear - 40.0) * 0.5;
            influence.confidence_adjustment -= (fear - 40.0) * 0.3;
            influence.reasoning.push(format!("fear {:.0} tightens risk", fear));
        }

        let panic = self.intensity(EmotionKind::Panic);
        if panic > tuning.panic_override_threshold {
            influence.override_action = Some(Action::Exit);
            influence
                .reasoning
                .push(format!("EMOTIONAL OVERRIDE: panic {:.0} forces EXIT", panic));
        }

        let fomo = self.intensity(EmotionKind::Fomo);
        if fomo > 40.0 && draft.is_entry() {
            influence.timing_adjustment -= (fomo - 40.0) * 0.5;
            influence.confidence_adjustment += (fomo - 40.0) * 0.1;
            influence.reasoning.push(format!("fomo {:.0} rushes the entry", fomo));
        }

        let joy = self.intensity(EmotionKind::Joy);
        if joy > 50.0 {
            influence.confidence_adjustment += (joy - 50.0) * 0.2;
            influence.reasoning.push(format!("joy {:.0} lifts confidence", joy));
        }

        let anger = self.intensity(EmotionKind::Anger);
        if anger > 50.0 {
            influence.risk_adjustment += (anger - 50.0) * 0.3;
            influence.reasoning.push(format!("anger {:.0} invites risk", anger));
        }

        let regret = self.intensity(EmotionKind::Regret);
        if regret > 50.0 {
            influence.confidence_adjustment -= (regret - 50.0) * 0.2;
            influence.timing_adjustment += (regret - 50.0) * 0.2;
            influence.reasoning.push(format!("regret {:.0} slows things down", regret));
        }

        let excitement = self.intensity(EmotionKind::Excitement);
        if excitement > 50.0 {
            influence.risk_adjustment += (excitement - 50.0) * 0.2;
        }

        if self.arousal > 70.0 {
            influence.timing_adjustment -= (self.arousal - 70.0) * 0.3;
        }

        influence
    }

    /// Every bounded value is in range.
    pub fn is_bounded(&self) -> bool {
        (-100.0..=100.0).contains(&self.valence)
            && (0.0..=100.0).contains(&self.arousal)
            && (-100.0..=100.0).contains(&self.dominance)
            && (0.0..=MAX_BUDGET).contains(&self.regulation_budget)
            && self.categorical.values().all(|v| (0.0..=100.0).contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> EmotionTuning {
        EmotionTuning::default()
    }

    #[test]
    fn test_betrayal_raises_anger_and_arouses() {
        let mut state = EmotionState::default();
        let traits = TraitVector::new();
        state
            .process(EmotionEvent::new(EmotionEventKind::Betrayal, 100.0), &traits, &tuning())
            .unwrap();
        assert_eq!(state.intensity(EmotionKind::Anger), 50.0);
        assert_eq!(state.valence, -45.0);
        assert_eq!(state.phase, EmotionPhase::Baseline);

        state
            .process(EmotionEvent::new(EmotionEventKind::Betrayal, 100.0), &traits, &tuning())
            .unwrap();
        assert_eq!(state.intensity(EmotionKind::Anger), 100.0);
        assert_eq!(state.phase, EmotionPhase::Aroused);
        assert!(state.is_bounded());
    }

    #[test]
    fn test_neuroticism_amplifies_valence() {
        let calm = TraitVector::from_pairs(&[(TraitId::Neuroticism, 0.0)]).unwrap();
        let anxious = TraitVector::from_pairs(&[(TraitId::Neuroticism, 100.0)]).unwrap();
        let event = EmotionEvent::new(EmotionEventKind::LosingTrade, 100.0);

        let mut a = EmotionState::default();
        a.process(event, &calm, &tuning()).unwrap();
        let mut b = EmotionState::default();
        b.process(event, &anxious, &tuning()).unwrap();
        assert!(b.valence < a.valence);
    }

    #[test]
    fn test_decay_half_lives() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Panic, 80.0, &tuning()).unwrap();
        state.set_intensity(EmotionKind::Regret, 80.0, &tuning()).unwrap();
        state.decay(2, &tuning());
        assert!((state.intensity(EmotionKind::Panic) - 40.0).abs() < 1e-9);
        assert!(state.intensity(EmotionKind::Regret) > 78.0);
        assert_eq!(state.phase, EmotionPhase::Aroused);
    }

    #[test]
    fn test_dimensions_drift_to_baseline() {
        let mut state = EmotionState::default();
        state.valence = -60.0;
        state.arousal = 90.0;
        state.decay(12, &tuning());
        assert!((state.valence + 30.0).abs() < 1e-9);
        assert!((state.arousal - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_regulation_spends_budget() {
        let mut state = EmotionState::default();
        let traits = TraitVector::from_pairs(&[(TraitId::Analytical, 80.0)]).unwrap();
        state.set_intensity(EmotionKind::Fear, 90.0, &tuning()).unwrap();

        let record = state.regulate(&traits, &tuning(), SimTime::ZERO).unwrap();
        assert_eq!(record.strategy, RegulationStrategy::Reappraisal);
        assert!((record.after - 58.0).abs() < 1e-9);
        assert_eq!(state.regulation_budget, 80.0);
        assert_eq!(state.phase, EmotionPhase::Regulating);
    }

    #[test]
    fn test_exhausted_budget_blocks_regulation() {
        let mut state = EmotionState::default();
        state.regulation_budget = 20.0;
        state.set_intensity(EmotionKind::Anger, 95.0, &tuning()).unwrap();
        assert!(state.regulate(&TraitVector::new(), &tuning(), SimTime::ZERO).is_none());
        assert_eq!(state.intensity(EmotionKind::Anger), 95.0);

        state.decay(1, &tuning());
        assert!(state.intensity(EmotionKind::Anger) < 95.0);
        assert_eq!(state.regulation_budget, 25.0);
    }

    #[test]
    fn test_panic_overrides_with_exit() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Panic, 75.0, &tuning()).unwrap();
        let influence = state.decision_impact(Action::Enter, &tuning());
        assert_eq!(influence.override_action, Some(Action::Exit));
        assert!(influence.reasoning.iter().any(|r| r.contains("EMOTIONAL OVERRIDE")));
    }

    #[test]
    fn test_fomo_only_affects_entries() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Fomo, 60.0, &tuning()).unwrap();
        assert!(state.decision_impact(Action::Enter, &tuning()).timing_adjustment < 0.0);
        assert_eq!(state.decision_impact(Action::Hold, &tuning()).timing_adjustment, 0.0);
    }

    #[test]
    fn test_fear_lowers_risk() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Fear, 80.0, &tuning()).unwrap();
        let influence = state.decision_impact(Action::Enter, &tuning());
        assert_eq!(influence.risk_adjustment, -20.0);
        assert!(influence.confidence_adjustment < 0.0);
    }

    #[test]
    fn test_coherence_tracks_conflicts() {
        let mut state = EmotionState::default();
        assert_eq!(state.coherence(), 100.0);
        state.set_intensity(EmotionKind::Joy, 40.0, &tuning()).unwrap();
        state.set_intensity(EmotionKind::Sadness, 30.0, &tuning()).unwrap();
        assert_eq!(state.coherence(), 70.0);
    }

    #[test]
    fn test_learning_moves_effectiveness() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Fear, 90.0, &tuning()).unwrap();
        state.regulate(&TraitVector::new(), &tuning(), SimTime::ZERO).unwrap();
        let updated = state.learn_regulation(true);
        assert_eq!(updated, vec![RegulationStrategy::Distraction]);
        assert!((state.effectiveness[&RegulationStrategy::Distraction] - 1.1).abs() < 1e-9);
        assert!(state.pending_regulations.is_empty());
    }

    #[test]
    fn test_reset_returns_to_baseline() {
        let mut state = EmotionState::default();
        state.set_intensity(EmotionKind::Panic, 90.0, &tuning()).unwrap();
        state.reset();
        assert_eq!(state.phase, EmotionPhase::Baseline);
        assert_eq!(state.intensity(EmotionKind::Panic), 0.0);
    }

    #[test]
    fn test_set_intensity_validates() {
        let mut state = EmotionState::default();
        assert!(state.set_intensity(EmotionKind::Joy, 120.0, &tuning()).is_err());
    }
}
