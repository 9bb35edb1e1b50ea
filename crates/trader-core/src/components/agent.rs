//! Agent Components
//!
//! A trader owns its personality, emotions, memories, relationships and
//! strategies outright. Other agents are only ever referred to by id.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use trader_events::{
    Action, AgentId, CounterpartyBehavior, MarketSnapshot, Opportunity, SessionId, SimTime,
};

use crate::components::emotion::{EmotionKind, EmotionState};
use crate::components::memory::{MemoryStore, RetentionPolicy};
use crate::components::relationship::RelationshipTable;
use crate::components::strategy::{ContextBucket, StrategyStore};
use crate::components::traits::{Archetype, TraitId, TraitStore, TraitVector};
use crate::config::{AgentConfig, AgentTuning, TuningConfig};

pub const MAX_ENERGY: f64 = 100.0;
pub const MAX_STRESS: f64 = 100.0;

/// Lifecycle of a decide / record_outcome pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Deciding,
    AwaitingOutcome,
}

/// Emotional state captured when a session opens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmotionSnapshot {
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
    pub dominant: Option<EmotionKind>,
}

impl EmotionSnapshot {
    pub fn capture(emotion: &EmotionState) -> Self {
        Self {
            valence: emotion.valence,
            arousal: emotion.arousal,
            dominance: emotion.dominance,
            dominant: emotion.dominant().map(|(kind, _)| kind),
        }
    }
}

/// Strategy selected for a decision, kept for attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyChoice {
    pub strategy_id: String,
    pub bucket: ContextBucket,
}

/// An open decision waiting for its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Session {
    pub id: SessionId,
    pub opened_at: SimTime,
    pub phase: SessionPhase,
    pub opportunity: Opportunity,
    pub market: MarketSnapshot,
    pub action: Action,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyChoice>,
    pub emotion_at_open: EmotionSnapshot,
}

impl Session {
    pub fn counterparty(&self) -> Option<&AgentId> {
        self.opportunity.counterparty.as_ref()
    }
}

/// Compact history entry for a consumed outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutcomeRecord {
    pub session_id: SessionId,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AgentId>,
    pub profit_loss: f64,
    pub counterparty_behavior: CounterpartyBehavior,
    pub unexpected: bool,
    pub score: f64,
    pub recorded_at: SimTime,
}

/// A trader and everything it exclusively owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Agent {
    pub id: AgentId,
    pub config: AgentConfig,
    pub traits: TraitStore,
    pub emotion: EmotionState,
    pub memory: MemoryStore,
    pub relationships: RelationshipTable,
    pub strategies: StrategyStore,
    /// 0 to 100
    pub energy: f64,
    /// 0 to 100
    pub stress: f64,
    /// Running confidence level, 0 to 100
    pub confidence: f64,
    /// Most recent outcomes, oldest first
    pub outcomes: VecDeque<OutcomeRecord>,
    /// Sessions awaiting outcomes, oldest first
    pub sessions: VecDeque<Session>,
    pub experience_count: u64,
    pub decisions_made: u64,
    pub created_at: SimTime,
    pub last_activity: SimTime,
}

impl Agent {
    pub fn new(id: AgentId, config: AgentConfig, traits: TraitVector, now: SimTime) -> Self {
        let confidence = traits.get(TraitId::Confidence);
        Self {
            id,
            config,
            traits: TraitStore::new(traits),
            emotion: EmotionState::new(now),
            memory: MemoryStore::new(),
            relationships: RelationshipTable::new(),
            strategies: StrategyStore::with_defaults(),
            energy: MAX_ENERGY,
            stress: 0.0,
            confidence,
            outcomes: VecDeque::new(),
            sessions: VecDeque::new(),
            experience_count: 0,
            decisions_made: 0,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn archetype(&self) -> Archetype {
        self.traits.archetype()
    }

    pub fn trait_value(&self, id: TraitId) -> f64 {
        self.traits.get(id)
    }

    pub fn retention_policy<'a>(&self, tuning: &'a TuningConfig) -> RetentionPolicy<'a> {
        RetentionPolicy::new(
            &tuning.memory,
            self.config.memory_retention_days,
            tuning.clock.ticks_per_day,
        )
    }

    pub fn is_exhausted(&self, tuning: &AgentTuning) -> bool {
        self.energy < tuning.exhausted_below
    }

    /// Passive recovery and emotional decay up to `now`.
    pub fn advance_to(&mut self, now: SimTime, tuning: &TuningConfig) {
        let ticks = now.ticks_since(self.last_activity) as f64;
        if ticks > 0.0 {
            self.energy = (self.energy + tuning.agent.energy_recovery_per_tick * ticks).min(MAX_ENERGY);
            self.stress = (self.stress - tuning.agent.stress_relief_per_tick * ticks).max(0.0);
            self.last_activity = now;
        }
        if self.config.enable_emotions {
            self.emotion.advance_to(now, &tuning.emotion);
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Removes and returns an open session.
    pub fn take_session(&mut self, id: &SessionId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| &s.id == id)?;
        self.sessions.remove(index)
    }

    /// Parks a session until its outcome arrives. Returns the session that
    /// had to be dropped to respect the limit, if any.
    pub fn park_session(&mut self, mut session: Session, limit: usize) -> Option<Session> {
        session.phase = SessionPhase::AwaitingOutcome;
        self.sessions.push_back(session);
        if self.sessions.len() > limit.max(1) {
            self.sessions.pop_front()
        } else {
            None
        }
    }

    pub fn push_outcome(&mut self, record: OutcomeRecord, limit: usize) {
        self.outcomes.push_back(record);
        while self.outcomes.len() > limit {
            self.outcomes.pop_front();
        }
    }

    /// Every bounded quantity is within range.
    pub fn is_bounded(&self) -> bool {
        (0.0..=MAX_ENERGY).contains(&self.energy)
            && (0.0..=MAX_STRESS).contains(&self.stress)
            && (0.0..=100.0).contains(&self.confidence)
            && self.emotion.is_bounded()
            && self.traits.current.iter().all(|(_, v)| (0.0..=100.0).contains(&v))
            && self.relationships.iter().all(|r| (0.0..=100.0).contains(&r.trust))
    }
}
