//! Snapshots and Persistence
//!
//! [`AgentSnapshot`] is a deterministic summary used to compare runs;
//! [`SerializedAgent`] is the full export that restores an agent exactly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use trader_events::{AgentId, RelationshipQuality, SimTime};

use crate::components::agent::{Agent, OutcomeRecord, Session, MAX_ENERGY, MAX_STRESS};
use crate::components::emotion::{EmotionKind, EmotionPhase, EmotionState, MAX_BUDGET};
use crate::components::memory::MemoryStore;
use crate::components::relationship::RelationshipTable;
use crate::components::strategy::StrategyStore;
use crate::components::traits::{Archetype, TraitStore, TraitVector};
use crate::config::AgentConfig;
use crate::error::{CoreError, Result};

/// Current export format
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSummary {
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
    pub categorical: BTreeMap<EmotionKind, f64>,
    pub phase: EmotionPhase,
    pub regulation_budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSummary {
    pub quality: RelationshipQuality,
    pub trust: f64,
    pub interactions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub active: bool,
    pub usage_count: u64,
    /// Fitness per context bucket
    pub fitness: BTreeMap<String, f64>,
}

/// Deterministic summary of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: AgentId,
    pub archetype: Archetype,
    pub traits: TraitVector,
    pub emotion: EmotionSummary,
    pub energy: f64,
    pub stress: f64,
    pub confidence: f64,
    pub memory_count: usize,
    pub crystallized_memories: usize,
    pub relationships: BTreeMap<AgentId, RelationshipSummary>,
    pub strategies: BTreeMap<String, StrategySummary>,
    pub experience_count: u64,
    pub decisions_made: u64,
    pub pending_sessions: usize,
    pub last_activity: SimTime,
}

impl AgentSnapshot {
    pub fn capture(agent: &Agent) -> Self {
        let emotion = &agent.emotion;
        Self {
            agent_id: agent.id.clone(),
            archetype: agent.archetype(),
            traits: agent.traits.current.clone(),
            emotion: EmotionSummary {
                valence: emotion.valence,
                arousal: emotion.arousal,
                dominance: emotion.dominance,
                categorical: emotion.categorical.clone(),
                phase: emotion.phase,
                regulation_budget: emotion.regulation_budget,
            },
            energy: agent.energy,
            stress: agent.stress,
            confidence: agent.confidence,
            memory_count: agent.memory.len(),
            crystallized_memories: agent.memory.crystallized_count(),
            relationships: agent
                .relationships
                .iter()
                .map(|r| {
                    (
                        r.counterparty.clone(),
                        RelationshipSummary {
                            quality: r.quality,
                            trust: r.trust,
                            interactions: r.interactions,
                        },
                    )
                })
                .collect(),
            strategies: agent
                .strategies
                .iter()
                .map(|s| {
                    (
                        s.id.clone(),
                        StrategySummary {
                            active: s.active,
                            usage_count: s.usage_count,
                            fitness: s.fitness.iter().map(|(b, f)| (b.to_string(), *f)).collect(),
                        },
                    )
                })
                .collect(),
            experience_count: agent.experience_count,
            decisions_made: agent.decisions_made,
            pending_sessions: agent.sessions.len(),
            last_activity: agent.last_activity,
        }
    }

    /// Canonical bytes for equality checks across runs.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Full export of an agent. Unknown fields are rejected on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerializedAgent {
    pub schema_version: u32,
    pub agent_id: AgentId,
    pub config: AgentConfig,
    pub traits: TraitStore,
    pub emotion: EmotionState,
    pub energy: f64,
    pub stress: f64,
    pub confidence: f64,
    pub outcomes: VecDeque<OutcomeRecord>,
    pub relationships: RelationshipTable,
    pub strategies: StrategyStore,
    pub memory: MemoryStore,
    pub pending_sessions: VecDeque<Session>,
    pub experience_count: u64,
    pub decisions_made: u64,
    pub created_at: SimTime,
    pub last_activity: SimTime,
    pub export_timestamp: SimTime,
}

impl SerializedAgent {
    pub fn export(agent: &Agent, export_timestamp: SimTime) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            agent_id: agent.id.clone(),
            config: agent.config.clone(),
            traits: agent.traits.clone(),
            emotion: agent.emotion.clone(),
            energy: agent.energy,
            stress: agent.stress,
            confidence: agent.confidence,
            outcomes: agent.outcomes.clone(),
            relationships: agent.relationships.clone(),
            strategies: agent.strategies.clone(),
            memory: agent.memory.clone(),
            pending_sessions: agent.sessions.clone(),
            experience_count: agent.experience_count,
            decisions_made: agent.decisions_made,
            created_at: agent.created_at,
            last_activity: agent.last_activity,
            export_timestamp,
        }
    }

    /// Range checks on every bounded value in the export.
    pub fn validate(&self) -> Result<()> {
        CoreError::check_bounds("energy", self.energy, 0.0, MAX_ENERGY)?;
        CoreError::check_bounds("stress", self.stress, 0.0, MAX_STRESS)?;
        CoreError::check_bounds("confidence", self.confidence, 0.0, 100.0)?;

        let emotion = &self.emotion;
        CoreError::check_bounds("emotion.valence", emotion.valence, -100.0, 100.0)?;
        CoreError::check_bounds("emotion.arousal", emotion.arousal, 0.0, 100.0)?;
        CoreError::check_bounds("emotion.dominance", emotion.dominance, -100.0, 100.0)?;
        CoreError::check_bounds("emotion.regulation_budget", emotion.regulation_budget, 0.0, MAX_BUDGET)?;
        for (kind, value) in &emotion.categorical {
            CoreError::check_bounds(&format!("emotion.{}", kind), *value, 0.0, 100.0)?;
        }
        for value in emotion.effectiveness.values() {
            CoreError::check_bounds("emotion.effectiveness", *value, 0.5, 1.5)?;
        }
        for (id, value) in self.traits.current.iter().chain(self.traits.initial.iter()) {
            CoreError::check_bounds(id.as_str(), value, 0.0, 100.0)?;
        }
        if !self.traits.is_tick_drift_within(100.0) {
            return Err(CoreError::OutOfBounds {
                field: "traits.tick_drift".to_string(),
                value: f64::NAN,
                min: -100.0,
                max: 100.0,
            });
        }

        for relationship in self.relationships.iter() {
            CoreError::check_bounds("relationship.trust", relationship.trust, 0.0, 100.0)?;
        }
        for strategy in self.strategies.iter() {
            for fitness in strategy.fitness.values() {
                CoreError::check_bounds("strategy.fitness", *fitness, 0.0, 1.0)?;
            }
            for score in &strategy.recent_scores {
                CoreError::check_bounds("strategy.recent_score", *score, 0.0, 1.0)?;
            }
        }
        for record in self.memory.records() {
            CoreError::check_bounds("memory.emotional_impact", record.emotional_impact, 0.0, 100.0)?;
        }
        for outcome in &self.outcomes {
            CoreError::check_bounds("outcome.profit_loss", outcome.profit_loss, f64::MIN, f64::MAX)?;
            CoreError::check_bounds("outcome.score", outcome.score, 0.0, 1.0)?;
        }
        for session in &self.pending_sessions {
            session.opportunity.validate()?;
            session.market.validate()?;
            CoreError::check_bounds("session.confidence", session.confidence, 0.0, 100.0)?;
        }
        Ok(())
    }

    /// Rebuilds the agent. Fails on an unsupported schema version or any
    /// out-of-range value.
    pub fn into_agent(self) -> Result<Agent> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CoreError::SchemaVersion {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        self.validate()?;
        Ok(Agent {
            id: self.agent_id,
            config: self.config,
            traits: self.traits,
            emotion: self.emotion,
            memory: self.memory,
            relationships: self.relationships,
            strategies: self.strategies,
            energy: self.energy,
            stress: self.stress,
            confidence: self.confidence,
            outcomes: self.outcomes,
            sessions: self.pending_sessions,
            experience_count: self.experience_count,
            decisions_made: self.decisions_made,
            created_at: self.created_at,
            last_activity: self.last_activity,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Writes one pretty-printed snapshot file per agent into `dir`.
pub fn write_snapshots(snapshots: &[AgentSnapshot], dir: impl AsRef<Path>) -> std::io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let path = dir.join(format!("{}.json", snapshot.agent_id));
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json)?;
        written.push(path);
    }
    Ok(written)
}
