//! Relationship Table
//!
//! Each agent's local view of the counterparties it has dealt with. The
//! trust network stays authoritative; these entries are the projection an
//! agent consults while deciding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use trader_events::{AgentId, CounterpartyBehavior, RelationshipQuality, SimTime};

/// Trust assumed for a counterparty the agent has never met
pub const DEFAULT_RELATIONSHIP_TRUST: f64 = 50.0;

/// A single counterparty relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub counterparty: AgentId,
    /// 0 to 100
    pub trust: f64,
    pub interactions: u32,
    pub successes: u32,
    pub failures: u32,
    pub betrayals: u32,
    pub cooperations: u32,
    pub quality: RelationshipQuality,
    pub first_met: SimTime,
    pub last_interaction: SimTime,
}

impl Relationship {
    pub fn new(counterparty: AgentId, now: SimTime) -> Self {
        Self {
            counterparty,
            trust: DEFAULT_RELATIONSHIP_TRUST,
            interactions: 0,
            successes: 0,
            failures: 0,
            betrayals: 0,
            cooperations: 0,
            quality: RelationshipQuality::Unknown,
            first_met: now,
            last_interaction: now,
        }
    }

    /// First matching rule wins.
    pub fn classify(trust: f64, successes: u32, failures: u32) -> RelationshipQuality {
        if trust > 80.0 && successes > 2 * failures {
            RelationshipQuality::TrustedPartner
        } else if trust > 60.0 && successes > failures {
            RelationshipQuality::ReliableContact
        } else if trust < 10.0 {
            RelationshipQuality::Avoid
        } else if trust < 30.0 || failures > successes {
            RelationshipQuality::RiskyCounterparty
        } else {
            RelationshipQuality::Neutral
        }
    }

    fn apply(&mut self, behavior: CounterpartyBehavior, now: SimTime) {
        match behavior {
            CounterpartyBehavior::Successful => {
                self.trust = (self.trust + 3.0).min(100.0);
                self.successes += 1;
            }
            CounterpartyBehavior::Failed => {
                self.trust = (self.trust - 2.0).max(0.0);
                self.failures += 1;
            }
            CounterpartyBehavior::Betrayal => {
                self.trust = (self.trust - 20.0).max(0.0);
                self.failures += 1;
                self.betrayals += 1;
            }
            CounterpartyBehavior::Cooperation => {
                self.trust = (self.trust + 5.0).min(100.0);
                self.successes += 1;
                self.cooperations += 1;
            }
        }
        self.interactions += 1;
        self.last_interaction = now;
        self.quality = Self::classify(self.trust, self.successes, self.failures);
    }
}

/// What changed in one update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    pub counterparty: AgentId,
    pub trust_before: f64,
    pub trust_after: f64,
    pub quality_before: RelationshipQuality,
    pub quality_after: RelationshipQuality,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipTable {
    entries: BTreeMap<AgentId, Relationship>,
}

impl RelationshipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counterparty: &AgentId) -> Option<&Relationship> {
        self.entries.get(counterparty)
    }

    /// Quality and trust, falling back to unknown / 50 for strangers.
    pub fn view(&self, counterparty: &AgentId) -> (RelationshipQuality, f64) {
        self.entries
            .get(counterparty)
            .map(|r| (r.quality, r.trust))
            .unwrap_or((RelationshipQuality::Unknown, DEFAULT_RELATIONSHIP_TRUST))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.values()
    }

    /// Applies one interaction, creating the entry on first contact.
    pub fn update(&mut self, counterparty: &AgentId, behavior: CounterpartyBehavior, now: SimTime) -> RelationshipUpdate {
        let entry = self
            .entries
            .entry(counterparty.clone())
            .or_insert_with(|| Relationship::new(counterparty.clone(), now));
        let trust_before = entry.trust;
        let quality_before = entry.quality;
        entry.apply(behavior, now);
        RelationshipUpdate {
            counterparty: counterparty.clone(),
            trust_before,
            trust_after: entry.trust,
            quality_before,
            quality_after: entry.quality,
        }
    }

    /// Drops long-idle relationships with thin, unremarkable history.
    pub fn prune(&mut self, now: SimTime, retention_days: u64, ticks_per_day: u64) -> Vec<AgentId> {
        let horizon = SimTime::days_to_ticks(retention_days, ticks_per_day);
        let mut pruned = Vec::new();
        self.entries.retain(|id, r| {
            let stale = now.ticks_since(r.last_interaction) >= horizon
                && r.interactions <= 2
                && matches!(r.quality, RelationshipQuality::Neutral | RelationshipQuality::Unknown);
            if stale {
                pruned.push(id.clone());
            }
            !stale
        });
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cp() -> AgentId {
        AgentId::from("cp")
    }

    #[test]
    fn test_stranger_view() {
        let table = RelationshipTable::new();
        assert_eq!(table.view(&cp()), (RelationshipQuality::Unknown, 50.0));
    }

    #[test]
    fn test_update_rules() {
        let mut table = RelationshipTable::new();
        let update = table.update(&cp(), CounterpartyBehavior::Successful, SimTime::ZERO);
        assert_eq!(update.trust_after, 53.0);
        assert_eq!(update.quality_after, RelationshipQuality::Neutral);

        table.update(&cp(), CounterpartyBehavior::Cooperation, SimTime::ZERO);
        table.update(&cp(), CounterpartyBehavior::Cooperation, SimTime::ZERO);
        assert_eq!(table.view(&cp()), (RelationshipQuality::ReliableContact, 63.0));

        let update = table.update(&cp(), CounterpartyBehavior::Betrayal, SimTime::ZERO);
        assert_eq!(update.trust_after, 43.0);
        assert_eq!(table.get(&cp()).unwrap().betrayals, 1);
    }

    #[test]
    fn test_classification_order() {
        assert_eq!(Relationship::classify(85.0, 5, 1), RelationshipQuality::TrustedPartner);
        assert_eq!(Relationship::classify(85.0, 2, 1), RelationshipQuality::ReliableContact);
        assert_eq!(Relationship::classify(5.0, 0, 0), RelationshipQuality::Avoid);
        assert_eq!(Relationship::classify(25.0, 3, 0), RelationshipQuality::RiskyCounterparty);
        assert_eq!(Relationship::classify(50.0, 0, 1), RelationshipQuality::RiskyCounterparty);
        assert_eq!(Relationship::classify(50.0, 1, 1), RelationshipQuality::Neutral);
    }

    #[test]
    fn test_trust_floors_at_zero() {
        let mut table = RelationshipTable::new();
        for _ in 0..4 {
            table.update(&cp(), CounterpartyBehavior::Betrayal, SimTime::ZERO);
        }
        assert_eq!(table.view(&cp()), (RelationshipQuality::Avoid, 0.0));
    }

    #[test]
    fn test_prune_idle_thin_relationships() {
        let mut table = RelationshipTable::new();
        let busy = AgentId::from("busy");
        table.update(&cp(), CounterpartyBehavior::Successful, SimTime::ZERO);
        table.update(&cp(), CounterpartyBehavior::Failed, SimTime::ZERO);
        for _ in 0..3 {
            table.update(&busy, CounterpartyBehavior::Successful, SimTime::ZERO);
        }

        assert!(table.prune(SimTime::new(24 * 89), 90, 24).is_empty());
        assert_eq!(table.prune(SimTime::new(24 * 90), 90, 24), vec![cp()]);
        assert!(table.get(&busy).is_some());
    }
}
