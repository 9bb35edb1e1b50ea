//! Maintenance System
//!
//! Periodic housekeeping for one agent: memory decay, pruning and
//! consolidation, plus dropping stale relationships.

use serde::{Deserialize, Serialize};
use trader_events::{AgentId, SimTime};

use crate::components::agent::Agent;
use crate::components::memory::PruneReport;
use crate::config::TuningConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub memories_removed: usize,
    pub newly_crystallized: usize,
    pub summaries: Vec<u64>,
    pub relationships_pruned: Vec<AgentId>,
}

impl MaintenanceReport {
    pub fn is_empty(&self) -> bool {
        self.memories_removed == 0
            && self.newly_crystallized == 0
            && self.summaries.is_empty()
            && self.relationships_pruned.is_empty()
    }
}

pub fn maintain_agent(agent: &mut Agent, now: SimTime, tuning: &TuningConfig) -> MaintenanceReport {
    agent.advance_to(now, tuning);
    let policy = agent.retention_policy(tuning);

    let PruneReport {
        removed,
        newly_crystallized,
    } = agent.memory.decay_and_prune(now, policy);
    let summaries = agent.memory.consolidate(now, policy);
    let relationships_pruned =
        agent
            .relationships
            .prune(now, agent.config.memory_retention_days, tuning.clock.ticks_per_day);

    let report = MaintenanceReport {
        memories_removed: removed,
        newly_crystallized,
        summaries,
        relationships_pruned,
    };
    if !report.is_empty() {
        tracing::debug!(
            agent = %agent.id,
            removed = report.memories_removed,
            summaries = report.summaries.len(),
            pruned = report.relationships_pruned.len(),
            "Maintenance pass"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::memory::{MemoryKind, MemoryPayload};
    use crate::components::traits::TraitVector;
    use crate::config::AgentConfig;
    use trader_events::CounterpartyBehavior;

    #[test]
    fn test_stale_state_is_cleared() {
        let tuning = TuningConfig::default();
        let mut agent = Agent::new(
            AgentId::from("trader_1"),
            AgentConfig::default(),
            TraitVector::new(),
            SimTime::ZERO,
        );
        let policy = agent.retention_policy(&tuning);
        agent
            .memory
            .record(MemoryKind::Trade, MemoryPayload::default(), None, 5.0, SimTime::ZERO, policy)
            .unwrap();
        agent
            .memory
            .record(MemoryKind::Trade, MemoryPayload::default(), None, 95.0, SimTime::ZERO, policy)
            .unwrap();
        agent
            .relationships
            .update(&AgentId::from("cp"), CounterpartyBehavior::Successful, SimTime::ZERO);

        let later = SimTime::new(24 * 91);
        let report = maintain_agent(&mut agent, later, &tuning);
        assert_eq!(report.memories_removed, 1);
        assert_eq!(report.relationships_pruned, vec![AgentId::from("cp")]);
        assert_eq!(agent.memory.len(), 1);
        assert!(agent.memory.records()[0].crystallized);
    }

    #[test]
    fn test_fresh_agent_needs_nothing() {
        let tuning = TuningConfig::default();
        let mut agent = Agent::new(
            AgentId::from("trader_1"),
            AgentConfig::default(),
            TraitVector::new(),
            SimTime::ZERO,
        );
        assert!(maintain_agent(&mut agent, SimTime::new(5), &tuning).is_empty());
    }
}
