//! Agent Spawning
//!
//! Randomized personalities for seeded populations.

use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::BTreeMap;
use trader_events::AgentId;

use crate::components::traits::{Archetype, TraitId, TraitVector};
use crate::error::Result;

/// Configuration for agent spawning
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    pub count: usize,
    pub prefix: String,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            count: 20,
            prefix: "trader".to_string(),
        }
    }
}

/// Generate randomized traits for an agent
pub fn generate_traits(rng: &mut SmallRng) -> Result<TraitVector> {
    // Average of two uniforms: centred on 50, extremes rare
    let pairs: Vec<(TraitId, f64)> = TraitId::ALL
        .iter()
        .map(|&id| {
            let a: f64 = rng.gen();
            let b: f64 = rng.gen();
            (id, ((a + b) / 2.0 * 100.0).clamp(5.0, 95.0))
        })
        .collect();
    TraitVector::from_pairs(&pairs)
}

/// Generate agent ID
pub fn generate_agent_id(prefix: &str, index: usize) -> AgentId {
    AgentId::new(format!("{}_{:04}", prefix, index))
}

/// Ids and personalities for a new population
pub fn generate_population(config: &SpawnConfig, rng: &mut SmallRng) -> Result<Vec<(AgentId, TraitVector)>> {
    (0..config.count)
        .map(|index| Ok((generate_agent_id(&config.prefix, index), generate_traits(rng)?)))
        .collect()
}

/// Summary of spawned agents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnSummary {
    pub total_agents: usize,
    pub by_archetype: BTreeMap<Archetype, usize>,
}

pub fn spawn_summary<'a>(traits: impl IntoIterator<Item = &'a TraitVector>) -> SpawnSummary {
    let mut summary = SpawnSummary::default();
    for vector in traits {
        summary.total_agents += 1;
        *summary.by_archetype.entry(Archetype::classify(vector)).or_insert(0) += 1;
    }
    summary
}
