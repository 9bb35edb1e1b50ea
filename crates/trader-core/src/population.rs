//! Population
//!
//! Arena that owns every agent and the shared trust network. Agents refer to
//! each other by id only; the network is the single shared mutable
//! structure and is only written from here, one update at a time.

use std::collections::BTreeMap;
use trader_events::{AgentId, Decision, MarketSnapshot, NetworkContext, Opportunity, Outcome, SessionId, SimTime};

use crate::components::agent::Agent;
use crate::components::memory::{MemoryKind, MemoryPayload};
use crate::components::strategy::Strategy;
use crate::components::traits::TraitVector;
use crate::components::trust::TrustNetwork;
use crate::config::{AgentConfig, TuningConfig};
use crate::error::{CoreError, Result};
use crate::output::{AgentSnapshot, SerializedAgent};
use crate::rng::AgentRng;
use crate::setup::{generate_population, SpawnConfig};
use crate::systems::{self, MaintenanceReport, UpdateReport};

/// Impact of the memory every agent is born with
const INIT_MEMORY_IMPACT: f64 = 10.0;

/// Observer of population activity.
///
/// Extension point for layers that watch many agents at once (collective
/// intelligence, meta-learning). Hooks see results after they are final and
/// cannot alter them.
pub trait PopulationHook {
    fn on_decision(&mut self, _decision: &Decision) {}

    fn on_outcome(&mut self, _tick: SimTime, _outcome: Option<&Outcome>, _report: &UpdateReport) {}
}

/// One decision to make in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub agent_id: AgentId,
    pub opportunity: Opportunity,
    pub market: MarketSnapshot,
    pub network: NetworkContext,
}

impl DecisionRequest {
    pub fn new(agent_id: AgentId, opportunity: Opportunity, market: MarketSnapshot) -> Self {
        Self {
            agent_id,
            opportunity,
            market,
            network: NetworkContext::default(),
        }
    }

    pub fn with_network(mut self, network: NetworkContext) -> Self {
        self.network = network;
        self
    }
}

/// One outcome to apply in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeDelivery {
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub outcome: Outcome,
}

/// What a maintenance pass did across the population
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationMaintenance {
    pub at: SimTime,
    pub agents: BTreeMap<AgentId, MaintenanceReport>,
    pub pruned_edges: Vec<(AgentId, AgentId)>,
}

pub struct Population {
    agents: BTreeMap<AgentId, Agent>,
    network: TrustNetwork,
    now: SimTime,
    global_seed: u64,
    tuning: TuningConfig,
    hooks: Vec<Box<dyn PopulationHook>>,
}

impl Population {
    pub fn new(global_seed: u64, tuning: TuningConfig) -> Self {
        let network = TrustNetwork::new(tuning.trust.clone(), tuning.clock.ticks_per_day);
        Self {
            agents: BTreeMap::new(),
            network,
            now: SimTime::ZERO,
            global_seed,
            tuning,
            hooks: Vec::new(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn global_seed(&self) -> u64 {
        self.global_seed
    }

    pub fn tuning(&self) -> &TuningConfig {
        &self.tuning
    }

    pub fn network(&self) -> &TrustNetwork {
        &self.network
    }

    /// Direct network access for seeding relationships.
    pub fn network_mut(&mut self) -> &mut TrustNetwork {
        &mut self.network
    }

    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn add_hook(&mut self, hook: Box<dyn PopulationHook>) {
        self.hooks.push(hook);
    }

    /// Direct agent access for seeding state.
    pub fn agent_mut(&mut self, id: &AgentId) -> Result<&mut Agent> {
        self.agents
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))
    }

    pub fn create_agent(&mut self, id: AgentId, config: AgentConfig) -> Result<AgentId> {
        self.create_agent_with_traits(id, config, TraitVector::new())
    }

    pub fn create_agent_with_traits(&mut self, id: AgentId, config: AgentConfig, traits: TraitVector) -> Result<AgentId> {
        if self.agents.contains_key(&id) {
            return Err(CoreError::DuplicateAgent(id));
        }
        let mut agent = Agent::new(id.clone(), config, traits, self.now);
        let policy = agent.retention_policy(&self.tuning);
        let payload = MemoryPayload::default().with_detail(format!("{} joined as {}", id, agent.archetype()));
        agent
            .memory
            .record(MemoryKind::Init, payload, None, INIT_MEMORY_IMPACT, self.now, policy)?;
        tracing::debug!(agent = %id, archetype = %agent.archetype(), "Agent created");
        self.agents.insert(id.clone(), agent);
        Ok(id)
    }

    /// Creates `spawn.count` agents with seeded random personalities.
    pub fn spawn_random(&mut self, spawn: &SpawnConfig, config: &AgentConfig) -> Result<Vec<AgentId>> {
        let mut rng = AgentRng::from_seed(self.global_seed);
        let mut created = Vec::with_capacity(spawn.count);
        for (id, traits) in generate_population(spawn, rng.inner())? {
            created.push(self.create_agent_with_traits(id, config.clone(), traits)?);
        }
        Ok(created)
    }

    /// Removes an agent and every trust edge touching it.
    pub fn remove_agent(&mut self, id: &AgentId) -> Result<Agent> {
        let agent = self
            .agents
            .remove(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))?;
        self.network.remove_node(id);
        Ok(agent)
    }

    /// Moves the clock forward by `ticks`.
    pub fn advance(&mut self, ticks: u64) -> Option<PopulationMaintenance> {
        self.advance_to(self.now.advance(ticks))
    }

    /// Moves the clock to `now`; runs maintenance when a day boundary is
    /// crossed. Time never runs backwards.
    pub fn advance_to(&mut self, now: SimTime) -> Option<PopulationMaintenance> {
        if now <= self.now {
            return None;
        }
        let tpd = self.tuning.clock.ticks_per_day.max(1);
        let crossed = now.tick() / tpd > self.now.tick() / tpd;
        self.now = now;
        self.network.advance_to(now);
        if crossed {
            Some(self.maintain())
        } else {
            None
        }
    }

    /// Memory and relationship housekeeping for every agent, then network
    /// decay and pruning.
    pub fn maintain(&mut self) -> PopulationMaintenance {
        let now = self.now;
        let mut report = PopulationMaintenance {
            at: now,
            ..PopulationMaintenance::default()
        };
        for (id, agent) in self.agents.iter_mut() {
            let agent_report = systems::maintain_agent(agent, now, &self.tuning);
            if !agent_report.is_empty() {
                report.agents.insert(id.clone(), agent_report);
            }
        }
        self.network.advance_to(now);
        report.pruned_edges = self.network.evolve(0);
        report
    }

    pub fn decide(
        &mut self,
        id: &AgentId,
        opportunity: &Opportunity,
        market: &MarketSnapshot,
        network: &NetworkContext,
    ) -> Result<Decision> {
        let now = self.now;
        let seed = self.global_seed;
        let tuning = &self.tuning;
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))?;
        let decision = systems::decide(agent, opportunity, market, network, now, seed, tuning)?;
        for hook in self.hooks.iter_mut() {
            hook.on_decision(&decision);
        }
        Ok(decision)
    }

    pub fn record_outcome(&mut self, id: &AgentId, session_id: SessionId, outcome: &Outcome) -> Result<UpdateReport> {
        let now = self.now;
        let tuning = &self.tuning;
        let network = &mut self.network;
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))?;
        let report = match systems::record_outcome(agent, session_id, outcome, network, now, tuning) {
            Ok(report) => report,
            Err(e) => {
                if e.is_recoverable() {
                    tracing::warn!(agent = %id, session = %session_id, error = %e, "Dropping outcome");
                }
                return Err(e);
            }
        };
        for hook in self.hooks.iter_mut() {
            hook.on_outcome(now, Some(outcome), &report);
        }
        Ok(report)
    }

    /// Records that `betrayer` betrayed `victim`.
    pub fn record_betrayal(
        &mut self,
        victim: &AgentId,
        betrayer: &AgentId,
        betrayal_kind: &str,
        damage: f64,
    ) -> Result<UpdateReport> {
        let now = self.now;
        let tuning = &self.tuning;
        let network = &mut self.network;
        let agent = self
            .agents
            .get_mut(victim)
            .ok_or_else(|| CoreError::UnknownAgent(victim.clone()))?;
        let report = systems::record_betrayal(agent, betrayer, betrayal_kind, damage, network, now, tuning)?;
        for hook in self.hooks.iter_mut() {
            hook.on_outcome(now, None, &report);
        }
        Ok(report)
    }

    /// Records a successful collaboration between `agent_id` and `partner`.
    pub fn record_partnership(
        &mut self,
        agent_id: &AgentId,
        partner: &AgentId,
        collaboration: &str,
        benefit: f64,
    ) -> Result<UpdateReport> {
        let now = self.now;
        let tuning = &self.tuning;
        let network = &mut self.network;
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| CoreError::UnknownAgent(agent_id.clone()))?;
        let report = systems::record_partnership(agent, partner, collaboration, benefit, network, now, tuning)?;
        for hook in self.hooks.iter_mut() {
            hook.on_outcome(now, None, &report);
        }
        Ok(report)
    }

    /// Adds or replaces a strategy for one agent.
    pub fn register_strategy(&mut self, id: &AgentId, strategy: Strategy) -> Result<Option<Strategy>> {
        Ok(self.agent_mut(id)?.strategies.register(strategy))
    }

    pub fn trust(&self, a: &AgentId, b: &AgentId) -> f64 {
        self.network.trust(a, b)
    }

    pub fn communities(&self) -> Vec<Vec<AgentId>> {
        self.network.communities()
    }

    pub fn snapshot(&self, id: &AgentId) -> Result<AgentSnapshot> {
        self.agents
            .get(id)
            .map(AgentSnapshot::capture)
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))
    }

    pub fn snapshot_bytes(&self, id: &AgentId) -> Result<Vec<u8>> {
        self.snapshot(id)?.to_bytes()
    }

    /// Snapshots of every agent, in id order.
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents.values().map(AgentSnapshot::capture).collect()
    }

    pub fn export(&self, id: &AgentId) -> Result<SerializedAgent> {
        self.agents
            .get(id)
            .map(|agent| SerializedAgent::export(agent, self.now))
            .ok_or_else(|| CoreError::UnknownAgent(id.clone()))
    }

    /// Installs an exported agent under `handle`, replacing any agent
    /// already there. The embedded id must match the handle.
    pub fn import(&mut self, handle: &AgentId, serialized: SerializedAgent) -> Result<()> {
        if &serialized.agent_id != handle {
            return Err(CoreError::IdMismatch {
                expected: handle.clone(),
                found: serialized.agent_id,
            });
        }
        let agent = serialized.into_agent()?;
        if let Some(previous) = self.agents.insert(handle.clone(), agent) {
            tracing::info!(agent = %previous.id, "Replaced agent on import");
        }
        Ok(())
    }

    /// Runs a batch of decisions in agent-id order. Requests for the same
    /// agent keep their relative order.
    pub fn decide_batch(&mut self, mut requests: Vec<DecisionRequest>) -> Vec<(AgentId, Result<Decision>)> {
        requests.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        requests
            .into_iter()
            .map(|request| {
                let result = self.decide(&request.agent_id, &request.opportunity, &request.market, &request.network);
                if let Err(e) = &result {
                    tracing::warn!(agent = %request.agent_id, error = %e, "Decision failed");
                }
                (request.agent_id, result)
            })
            .collect()
    }

    /// Applies a batch of outcomes ordered by (agent, counterparty,
    /// delivery order). Failed deliveries are logged and skipped.
    pub fn apply_outcomes(&mut self, deliveries: Vec<OutcomeDelivery>) -> Vec<(AgentId, Result<UpdateReport>)> {
        let mut keyed: Vec<(AgentId, Option<AgentId>, usize, OutcomeDelivery)> = deliveries
            .into_iter()
            .enumerate()
            .map(|(seq, delivery)| {
                let counterparty = self
                    .agents
                    .get(&delivery.agent_id)
                    .and_then(|agent| agent.session(&delivery.session_id))
                    .and_then(|session| session.counterparty().cloned());
                (delivery.agent_id.clone(), counterparty, seq, delivery)
            })
            .collect();
        keyed.sort_by(|a, b| (&a.0, &a.1, a.2).cmp(&(&b.0, &b.1, b.2)));

        keyed
            .into_iter()
            .map(|(agent_id, _, _, delivery)| {
                let result = self.record_outcome(&agent_id, delivery.session_id, &delivery.outcome);
                if let Err(e) = &result {
                    if !e.is_recoverable() {
                        tracing::warn!(agent = %agent_id, error = %e, "Outcome rejected");
                    }
                }
                (agent_id, result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::strategy::StrategyParameters;
    use std::cell::RefCell;
    use std::rc::Rc;
    use trader_events::{fixtures, Action, OpportunityType, RelationshipQuality};

    fn population() -> Population {
        let mut population = Population::new(42, TuningConfig::default());
        for name in ["alice", "bob", "carol"] {
            population.create_agent(AgentId::from(name), AgentConfig::default()).unwrap();
        }
        population
    }

    #[derive(Default)]
    struct Counter {
        decisions: usize,
        outcomes: usize,
    }

    struct CountingHook(Rc<RefCell<Counter>>);

    impl PopulationHook for CountingHook {
        fn on_decision(&mut self, _decision: &Decision) {
            self.0.borrow_mut().decisions += 1;
        }

        fn on_outcome(&mut self, _tick: SimTime, _outcome: Option<&Outcome>, _report: &UpdateReport) {
            self.0.borrow_mut().outcomes += 1;
        }
    }

    #[test]
    fn test_create_and_remove() {
        let mut population = population();
        assert_eq!(population.len(), 3);
        let err = population
            .create_agent(AgentId::from("alice"), AgentConfig::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateAgent(_)));
        assert_eq!(population.agent(&AgentId::from("alice")).unwrap().memory.len(), 1);

        population.remove_agent(&AgentId::from("bob")).unwrap();
        assert!(population.remove_agent(&AgentId::from("bob")).is_err());
        assert_eq!(population.agent_ids(), vec![AgentId::from("alice"), AgentId::from("carol")]);
    }

    #[test]
    fn test_decide_and_record_through_hooks() {
        let mut population = population();
        let counter = Rc::new(RefCell::new(Counter::default()));
        population.add_hook(Box::new(CountingHook(counter.clone())));

        let alice = AgentId::from("alice");
        let decision = population
            .decide(&alice, &fixtures::social_trade("bob"), &fixtures::steady_market(), &NetworkContext::default())
            .unwrap();
        assert_eq!(decision.action, Action::Negotiate);

        population.advance(1);
        population
            .record_outcome(&alice, decision.session_id, &fixtures::win(30.0))
            .unwrap();
        assert!(population.trust(&alice, &AgentId::from("bob")) > 50.0);

        let stale = population.record_outcome(&alice, decision.session_id, &fixtures::win(30.0));
        assert!(stale.unwrap_err().is_recoverable());

        let counter = counter.borrow();
        assert_eq!(counter.decisions, 1);
        assert_eq!(counter.outcomes, 1);
    }

    #[test]
    fn test_unknown_agent() {
        let mut population = population();
        let err = population
            .decide(
                &AgentId::from("mallory"),
                &fixtures::day_trade(),
                &fixtures::steady_market(),
                &NetworkContext::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownAgent(_)));
    }

    #[test]
    fn test_reported_betrayal_vetoes_dealing() {
        let mut population = population();
        let alice = AgentId::from("alice");
        let bob = AgentId::from("bob");
        population.record_betrayal(&alice, &bob, "rug_pull", 80.0).unwrap();
        population.advance(5);

        let decision = population
            .decide(&alice, &fixtures::social_trade("bob"), &fixtures::steady_market(), &NetworkContext::default())
            .unwrap();
        assert_eq!(decision.relationship_quality, Some(RelationshipQuality::Avoid));
        assert!(decision.action == Action::Abstain || decision.confidence < 40.0);
        assert!(decision.mentions("betrayal"));
    }

    #[test]
    fn test_import_requires_matching_handle() {
        let mut population = population();
        let exported = population.export(&AgentId::from("alice")).unwrap();
        let err = population.import(&AgentId::from("bob"), exported.clone()).unwrap_err();
        assert!(matches!(err, CoreError::IdMismatch { .. }));

        let mut fresh = Population::new(42, TuningConfig::default());
        fresh.import(&AgentId::from("alice"), exported).unwrap();
        assert_eq!(
            fresh.snapshot_bytes(&AgentId::from("alice")).unwrap(),
            population.snapshot_bytes(&AgentId::from("alice")).unwrap()
        );
    }

    #[test]
    fn test_batches_are_order_independent() {
        let requests = |order: &[&str]| -> Vec<DecisionRequest> {
            order
                .iter()
                .map(|name| {
                    DecisionRequest::new(AgentId::from(*name), fixtures::day_trade(), fixtures::steady_market())
                })
                .collect()
        };

        let mut a = population();
        let mut b = population();
        let first = a.decide_batch(requests(&["carol", "alice", "bob"]));
        let second = b.decide_batch(requests(&["bob", "carol", "alice"]));
        let ids: Vec<AgentId> = first.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec![AgentId::from("alice"), AgentId::from("bob"), AgentId::from("carol")]);
        for ((_, x), (_, y)) in first.iter().zip(second.iter()) {
            assert_eq!(x.as_ref().unwrap(), y.as_ref().unwrap());
        }

        let deliveries = |results: &[(AgentId, Result<Decision>)], reverse: bool| {
            let mut out: Vec<OutcomeDelivery> = results
                .iter()
                .map(|(id, decision)| OutcomeDelivery {
                    agent_id: id.clone(),
                    session_id: decision.as_ref().unwrap().session_id,
                    outcome: fixtures::win(10.0),
                })
                .collect();
            if reverse {
                out.reverse();
            }
            out
        };
        let da = deliveries(&first, false);
        let db = deliveries(&second, true);
        a.apply_outcomes(da);
        b.apply_outcomes(db);
        assert_eq!(a.snapshots(), b.snapshots());
    }

    #[test]
    fn test_day_boundary_runs_maintenance() {
        let mut population = population();
        assert!(population.advance(5).is_none());
        let report = population.advance(24).unwrap();
        assert_eq!(report.at, SimTime::new(29));
        assert!(population.advance_to(SimTime::new(3)).is_none());
        assert_eq!(population.now(), SimTime::new(29));
    }

    #[test]
    fn test_register_strategy() {
        let mut population = population();
        let strategy = Strategy::new(
            "contrarian",
            StrategyParameters::new(0.8, 0.6, 4.0, 0.1),
            vec![OpportunityType::DayTrade],
        );
        let alice = AgentId::from("alice");
        assert!(population.register_strategy(&alice, strategy).unwrap().is_none());
        assert!(population.agent(&alice).unwrap().strategies.get("contrarian").is_some());
    }

    #[test]
    fn test_spawn_random_is_seeded() {
        let mut a = Population::new(9, TuningConfig::default());
        let mut b = Population::new(9, TuningConfig::default());
        let spawn = SpawnConfig {
            count: 4,
            prefix: "t".to_string(),
        };
        a.spawn_random(&spawn, &AgentConfig::default()).unwrap();
        b.spawn_random(&spawn, &AgentConfig::default()).unwrap();
        assert_eq!(a.snapshots(), b.snapshots());
        assert_eq!(a.len(), 4);
    }
}
