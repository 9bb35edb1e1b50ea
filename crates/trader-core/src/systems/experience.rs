//! Experience System
//!
//! Folds an outcome back into the agent that made the decision: memory,
//! relationships, emotions, strategy fitness, personality and finally the
//! shared trust network.
//!
//! Updates are applied to a staged copy of the agent. The network update runs
//! last and the copy is committed only once every fatal step has succeeded,
//! so a failed outcome never leaves the agent half-updated.

use serde::{Deserialize, Serialize};
use trader_events::{AgentId, CounterpartyBehavior, Outcome, SessionId, SimTime};

use crate::components::agent::{Agent, OutcomeRecord};
use crate::components::emotion::{EmotionEvent, EmotionEventKind, RegulationStrategy};
use crate::components::memory::{MemoryKind, MemoryPayload};
use crate::components::relationship::RelationshipUpdate;
use crate::components::strategy::{outcome_score, LearnReport};
use crate::components::traits::{EvolutionTrigger, TraitChange, TraitEvent, TraitEventOutcome};
use crate::components::trust::{Interaction, InteractionKind, TrustAdjustment, TrustNetwork};
use crate::config::TuningConfig;
use crate::error::{CoreError, Result};

/// Experience counts that earn a milestone memory
pub const MILESTONES: [u64; 5] = [10, 50, 100, 500, 1000];

/// Intensity of the surprise and milestone events
const SURPRISE_INTENSITY: f64 = 50.0;
const MILESTONE_INTENSITY: f64 = 60.0;

/// Everything one outcome changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub emotional_impact: f64,
    pub memory_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<LearnReport>,
    pub trait_changes: Vec<TraitChange>,
    pub emotion: Vec<String>,
    pub regulation_learned: Vec<RegulationStrategy>,
    /// Change of the direct edge to the counterparty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_delta: Option<f64>,
    pub propagated: Vec<TrustAdjustment>,
    /// Recoverable problems that were skipped
    pub warnings: Vec<String>,
}

impl UpdateReport {
    fn new(agent_id: AgentId, session_id: Option<SessionId>) -> Self {
        Self {
            agent_id,
            session_id,
            emotional_impact: 0.0,
            memory_ids: Vec::new(),
            relationship: None,
            strategy: None,
            trait_changes: Vec::new(),
            emotion: Vec::new(),
            regulation_learned: Vec::new(),
            trust_delta: None,
            propagated: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Emotional weight of an outcome, 0 to 100.
pub fn emotional_impact(outcome: &Outcome, experience_count: u64, early_life: u64) -> f64 {
    let mut impact = 0.5 * outcome.profit_loss.abs();
    if outcome.unexpected {
        impact += 20.0;
    }
    if experience_count < early_life {
        impact += 15.0;
    }
    match outcome.counterparty_behavior {
        CounterpartyBehavior::Betrayal => impact += 30.0,
        CounterpartyBehavior::Cooperation => impact += 10.0,
        CounterpartyBehavior::Successful | CounterpartyBehavior::Failed => {}
    }
    impact.min(100.0)
}

pub fn interaction_kind(behavior: CounterpartyBehavior) -> InteractionKind {
    match behavior {
        CounterpartyBehavior::Successful => InteractionKind::SuccessfulTrade,
        CounterpartyBehavior::Failed => InteractionKind::FailedTrade,
        CounterpartyBehavior::Betrayal => InteractionKind::Betrayal,
        CounterpartyBehavior::Cooperation => InteractionKind::Cooperation,
    }
}

fn trait_events(outcome: &Outcome, impact: f64, threshold: f64) -> Vec<TraitEvent> {
    let pl = outcome.profit_loss;
    let mut events = Vec::new();
    if pl > threshold {
        events.push(TraitEvent::new(EvolutionTrigger::BigWin, TraitEventOutcome::Favorable, pl.min(100.0)));
    } else if pl < -threshold {
        events.push(TraitEvent::new(
            EvolutionTrigger::BigLoss,
            TraitEventOutcome::Unfavorable,
            pl.abs().min(100.0),
        ));
    }
    match outcome.counterparty_behavior {
        CounterpartyBehavior::Betrayal => {
            events.push(TraitEvent::new(EvolutionTrigger::Betrayal, TraitEventOutcome::Unfavorable, impact))
        }
        CounterpartyBehavior::Cooperation => {
            events.push(TraitEvent::new(EvolutionTrigger::Cooperation, TraitEventOutcome::Favorable, impact))
        }
        CounterpartyBehavior::Successful | CounterpartyBehavior::Failed => {}
    }
    if outcome.unexpected {
        let direction = if pl >= 0.0 {
            TraitEventOutcome::Favorable
        } else {
            TraitEventOutcome::Unfavorable
        };
        events.push(TraitEvent::new(EvolutionTrigger::Surprise, direction, SURPRISE_INTENSITY));
    }
    events
}

fn emotion_events(outcome: &Outcome, impact: f64) -> Vec<EmotionEvent> {
    let pl = outcome.profit_loss;
    let mut events = Vec::new();
    if pl > 0.0 {
        events.push(EmotionEvent::new(EmotionEventKind::ProfitableTrade, pl.min(100.0)));
    } else if pl < 0.0 {
        events.push(EmotionEvent::new(EmotionEventKind::LosingTrade, pl.abs().min(100.0)));
    }
    match outcome.counterparty_behavior {
        CounterpartyBehavior::Betrayal => events.push(EmotionEvent::new(EmotionEventKind::Betrayal, impact)),
        CounterpartyBehavior::Cooperation => events.push(EmotionEvent::new(EmotionEventKind::Cooperation, impact)),
        CounterpartyBehavior::Successful | CounterpartyBehavior::Failed => {}
    }
    if outcome.unexpected {
        events.push(EmotionEvent::new(EmotionEventKind::UnexpectedOutcome, SURPRISE_INTENSITY));
    }
    events
}

/// Applies the outcome of an open session.
///
/// Fails with [`CoreError::UnknownSession`] when the session was never
/// opened, was already consumed or was dropped at the pending limit.
pub fn record_outcome(
    agent: &mut Agent,
    session_id: SessionId,
    outcome: &Outcome,
    network: &mut TrustNetwork,
    now: SimTime,
    tuning: &TuningConfig,
) -> Result<UpdateReport> {
    outcome.validate()?;
    if agent.session(&session_id).is_none() {
        return Err(CoreError::UnknownSession {
            agent: agent.id.clone(),
            session: session_id,
        });
    }

    let mut staged = agent.clone();
    let session = match staged.take_session(&session_id) {
        Some(session) => session,
        None => {
            return Err(CoreError::UnknownSession {
                agent: agent.id.clone(),
                session: session_id,
            })
        }
    };
    staged.advance_to(now, tuning);

    let mut report = UpdateReport::new(staged.id.clone(), Some(session_id));
    let config = staged.config.clone();
    let policy = staged.retention_policy(tuning);
    let impact = emotional_impact(outcome, staged.experience_count, tuning.agent.early_life_experiences);
    report.emotional_impact = impact;
    let counterparty = session.counterparty().cloned();
    let behavior = outcome.counterparty_behavior;

    // Memory
    let mut payload = MemoryPayload::for_stimulus(&session.opportunity, &session.market);
    payload.profit_loss = Some(outcome.profit_loss);
    let tag = if outcome.profit_loss > 0.0 {
        "win"
    } else if outcome.profit_loss < 0.0 {
        "loss"
    } else {
        "flat"
    };
    let id = staged
        .memory
        .record(MemoryKind::Trade, payload, Some(tag.to_string()), impact, now, policy)?;
    report.memory_ids.push(id);

    if let Some(cp) = &counterparty {
        match behavior {
            CounterpartyBehavior::Betrayal => {
                let context = session.opportunity.asset.as_deref();
                let id = staged.memory.betrayal(cp, "trade_betrayal", context, impact, now, policy)?;
                report.memory_ids.push(id);
            }
            CounterpartyBehavior::Cooperation => {
                let id = staged.memory.partnership(cp, "trade_cooperation", impact, now, policy)?;
                report.memory_ids.push(id);
            }
            CounterpartyBehavior::Successful | CounterpartyBehavior::Failed => {}
        }
        if config.enable_networking {
            report.relationship = Some(staged.relationships.update(cp, behavior, now));
        }
    }

    // Emotion
    let score = outcome_score(outcome);
    if config.enable_emotions {
        for event in emotion_events(outcome, impact) {
            let update = staged.emotion.process(event, &staged.traits.current, &tuning.emotion)?;
            report.emotion.extend(update.reasoning);
        }
        report.regulation_learned = staged.emotion.learn_regulation(score >= 0.5);
    }

    // Strategy
    if let Some(choice) = &session.strategy {
        match staged
            .strategies
            .learn(&choice.strategy_id, choice.bucket, score, &tuning.strategy, config.enable_learning)
        {
            Ok(learned) => report.strategy = Some(learned),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(agent = %staged.id, session = %session_id, error = %e, "Skipping strategy update");
                report.warnings.push(e.to_string());
            }
            Err(e) => return Err(e),
        }
    }

    // Personality
    let events = trait_events(outcome, impact, tuning.traits.evolution_threshold);
    if !events.is_empty() {
        report.trait_changes = staged
            .traits
            .evolve(&events, &tuning.traits, config.personality_evolution, now);
    }

    // Bookkeeping
    staged.push_outcome(
        OutcomeRecord {
            session_id,
            action: session.action,
            counterparty: counterparty.clone(),
            profit_loss: outcome.profit_loss,
            counterparty_behavior: behavior,
            unexpected: outcome.unexpected,
            score,
            recorded_at: now,
        },
        tuning.agent.outcome_history,
    );
    staged.experience_count += 1;
    if outcome.profit_loss < 0.0 {
        staged.stress += (outcome.profit_loss.abs() * 0.2).min(20.0);
    } else {
        staged.stress -= (outcome.profit_loss * 0.05).min(10.0);
    }
    if behavior == CounterpartyBehavior::Betrayal {
        staged.stress += 10.0;
    }
    staged.stress = staged.stress.clamp(0.0, 100.0);
    staged.confidence = (staged.confidence + (score - 0.5) * 10.0).clamp(0.0, 100.0);

    if MILESTONES.contains(&staged.experience_count) {
        let payload = MemoryPayload::default().with_detail(format!("{} experiences", staged.experience_count));
        let id = staged.memory.record(
            MemoryKind::Milestone,
            payload,
            Some("milestone".to_string()),
            MILESTONE_INTENSITY,
            now,
            policy,
        )?;
        report.memory_ids.push(id);
        if config.enable_emotions {
            let event = EmotionEvent::new(EmotionEventKind::Milestone, MILESTONE_INTENSITY);
            let update = staged.emotion.process(event, &staged.traits.current, &tuning.emotion)?;
            report.emotion.extend(update.reasoning);
        }
    }

    // Network last; nothing above is visible until this succeeds.
    if config.enable_networking {
        if let Some(cp) = &counterparty {
            network.advance_to(now);
            let interaction = Interaction::new(interaction_kind(behavior), impact);
            report.trust_delta = Some(network.observe(cp, &staged.id, interaction)?);
            report.propagated = network.propagate(cp, &staged.id, interaction)?;
        }
    }

    tracing::debug!(
        agent = %staged.id,
        session = %session_id,
        impact,
        memories = report.memory_ids.len(),
        "Outcome recorded"
    );
    *agent = staged;
    Ok(report)
}

/// Records a betrayal outside any session, e.g. one reported by a broker.
pub fn record_betrayal(
    agent: &mut Agent,
    betrayer: &AgentId,
    betrayal_kind: &str,
    damage: f64,
    network: &mut TrustNetwork,
    now: SimTime,
    tuning: &TuningConfig,
) -> Result<UpdateReport> {
    record_social(agent, betrayer, CounterpartyBehavior::Betrayal, betrayal_kind, damage, network, now, tuning)
}

/// Records a successful collaboration outside any session.
pub fn record_partnership(
    agent: &mut Agent,
    partner: &AgentId,
    collaboration: &str,
    benefit: f64,
    network: &mut TrustNetwork,
    now: SimTime,
    tuning: &TuningConfig,
) -> Result<UpdateReport> {
    record_social(agent, partner, CounterpartyBehavior::Cooperation, collaboration, benefit, network, now, tuning)
}

#[allow(clippy::too_many_arguments)]
fn record_social(
    agent: &mut Agent,
    counterparty: &AgentId,
    behavior: CounterpartyBehavior,
    detail: &str,
    magnitude: f64,
    network: &mut TrustNetwork,
    now: SimTime,
    tuning: &TuningConfig,
) -> Result<UpdateReport> {
    CoreError::check_bounds("magnitude", magnitude, 0.0, 100.0)?;
    if counterparty == &agent.id {
        return Err(CoreError::SelfInteraction(agent.id.clone()));
    }

    let mut staged = agent.clone();
    staged.advance_to(now, tuning);
    let config = staged.config.clone();
    let policy = staged.retention_policy(tuning);
    let mut report = UpdateReport::new(staged.id.clone(), None);
    report.emotional_impact = magnitude;

    let (emotion_kind, trigger, direction) = match behavior {
        CounterpartyBehavior::Betrayal => {
            let id = staged.memory.betrayal(counterparty, detail, None, magnitude, now, policy)?;
            report.memory_ids.push(id);
            (EmotionEventKind::Betrayal, EvolutionTrigger::Betrayal, TraitEventOutcome::Unfavorable)
        }
        _ => {
            let id = staged.memory.partnership(counterparty, detail, magnitude, now, policy)?;
            report.memory_ids.push(id);
            (EmotionEventKind::Cooperation, EvolutionTrigger::Cooperation, TraitEventOutcome::Favorable)
        }
    };

    if config.enable_networking {
        report.relationship = Some(staged.relationships.update(counterparty, behavior, now));
    }
    if config.enable_emotions {
        let update = staged
            .emotion
            .process(EmotionEvent::new(emotion_kind, magnitude), &staged.traits.current, &tuning.emotion)?;
        report.emotion = update.reasoning;
    }
    report.trait_changes = staged.traits.evolve(
        &[TraitEvent::new(trigger, direction, magnitude)],
        &tuning.traits,
        config.personality_evolution,
        now,
    );

    if config.enable_networking {
        network.advance_to(now);
        let interaction = Interaction::new(interaction_kind(behavior), magnitude);
        report.trust_delta = Some(network.observe(counterparty, &staged.id, interaction)?);
        report.propagated = network.propagate(counterparty, &staged.id, interaction)?;
    }

    *agent = staged;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::traits::{TraitId, TraitVector};
    use crate::config::AgentConfig;
    use crate::systems::decision::decide;
    use trader_events::{fixtures, NetworkContext, RelationshipQuality};

    fn setup() -> (Agent, TrustNetwork, TuningConfig) {
        let tuning = TuningConfig::default();
        let agent = Agent::new(
            AgentId::from("trader_1"),
            AgentConfig::default(),
            TraitVector::new(),
            SimTime::ZERO,
        );
        let network = TrustNetwork::new(tuning.trust.clone(), tuning.clock.ticks_per_day);
        (agent, network, tuning)
    }

    fn open_session(agent: &mut Agent, tuning: &TuningConfig, counterparty: Option<&str>) -> SessionId {
        let opportunity = match counterparty {
            Some(cp) => fixtures::social_trade(cp),
            None => fixtures::day_trade(),
        };
        decide(
            agent,
            &opportunity,
            &fixtures::steady_market(),
            &NetworkContext::default(),
            SimTime::ZERO,
            42,
            tuning,
        )
        .unwrap()
        .session_id
    }

    #[test]
    fn test_impact_formula() {
        let outcome = Outcome::new(40.0, CounterpartyBehavior::Successful);
        assert_eq!(emotional_impact(&outcome, 0, 10), 35.0);
        assert_eq!(emotional_impact(&outcome, 10, 10), 20.0);
        assert_eq!(emotional_impact(&fixtures::betrayal(200.0), 20, 10), 100.0);
    }

    #[test]
    fn test_outcome_updates_every_store() {
        let (mut agent, mut network, tuning) = setup();
        let session = open_session(&mut agent, &tuning, Some("cp_1"));

        let report = record_outcome(
            &mut agent,
            session,
            &fixtures::win(80.0),
            &mut network,
            SimTime::new(1),
            &tuning,
        )
        .unwrap();

        assert!(agent.sessions.is_empty());
        assert_eq!(agent.experience_count, 1);
        assert_eq!(agent.outcomes.len(), 1);
        assert_eq!(report.emotional_impact, 55.0);
        assert_eq!(report.memory_ids.len(), 1);
        assert_eq!(agent.relationships.view(&AgentId::from("cp_1")).1, 53.0);
        assert!(!report.trait_changes.is_empty());
        assert!(report.trust_delta.unwrap() > 0.0);
        assert!(network.trust(&AgentId::from("trader_1"), &AgentId::from("cp_1")) > 50.0);
    }

    #[test]
    fn test_unknown_session_is_recoverable() {
        let (mut agent, mut network, tuning) = setup();
        let before = agent.clone();
        let err = record_outcome(
            &mut agent,
            SessionId::from_random_bytes([7; 16]),
            &fixtures::win(10.0),
            &mut network,
            SimTime::ZERO,
            &tuning,
        )
        .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(agent, before);
    }

    #[test]
    fn test_session_consumed_once() {
        let (mut agent, mut network, tuning) = setup();
        let session = open_session(&mut agent, &tuning, None);
        record_outcome(&mut agent, session, &fixtures::win(5.0), &mut network, SimTime::ZERO, &tuning).unwrap();
        assert!(record_outcome(&mut agent, session, &fixtures::win(5.0), &mut network, SimTime::ZERO, &tuning).is_err());
    }

    #[test]
    fn test_invalid_outcome_rolls_back() {
        let (mut agent, mut network, tuning) = setup();
        let session = open_session(&mut agent, &tuning, None);
        let before = agent.clone();
        let bad = Outcome::new(f64::NAN, CounterpartyBehavior::Successful);
        assert!(record_outcome(&mut agent, session, &bad, &mut network, SimTime::ZERO, &tuning).is_err());
        assert_eq!(agent, before);
        assert_eq!(network.edge_count(), 0);
    }

    #[test]
    fn test_missing_strategy_becomes_warning() {
        let (mut agent, mut network, tuning) = setup();
        let session = open_session(&mut agent, &tuning, None);
        agent.sessions[0].strategy.as_mut().unwrap().strategy_id = "retired_long_ago".to_string();

        let report =
            record_outcome(&mut agent, session, &fixtures::win(5.0), &mut network, SimTime::ZERO, &tuning).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.strategy.is_none());
        assert_eq!(agent.experience_count, 1);
    }

    #[test]
    fn test_betrayal_outcome_is_remembered() {
        let (mut agent, mut network, tuning) = setup();
        let session = open_session(&mut agent, &tuning, Some("cp_x"));
        record_outcome(&mut agent, session, &fixtures::betrayal(60.0), &mut network, SimTime::new(2), &tuning)
            .unwrap();

        let cp = AgentId::from("cp_x");
        assert_eq!(agent.memory.betrayals_by(&cp).count(), 1);
        assert_eq!(agent.relationships.get(&cp).unwrap().betrayals, 1);
        assert!(agent.trait_value(TraitId::Loyalty) <= 50.0);
        assert!(network.trust(&agent.id, &cp) < 30.0);
    }

    #[test]
    fn test_networking_disabled_skips_relationships() {
        let (mut agent, mut network, tuning) = setup();
        agent.config.enable_networking = false;
        let session = open_session(&mut agent, &tuning, Some("cp_1"));
        let report =
            record_outcome(&mut agent, session, &fixtures::win(20.0), &mut network, SimTime::ZERO, &tuning).unwrap();
        assert!(report.relationship.is_none());
        assert!(agent.relationships.is_empty());
        assert_eq!(network.edge_count(), 0);
    }

    #[test]
    fn test_reported_betrayal() {
        let (mut agent, mut network, tuning) = setup();
        let cp = AgentId::from("cp_x");
        let report = record_betrayal(&mut agent, &cp, "front_running", 90.0, &mut network, SimTime::ZERO, &tuning)
            .unwrap();
        assert_eq!(report.memory_ids.len(), 1);
        assert_eq!(agent.relationships.view(&cp).0, RelationshipQuality::RiskyCounterparty);

        let own = agent.id.clone();
        assert!(record_betrayal(&mut agent, &own, "x", 10.0, &mut network, SimTime::ZERO, &tuning).is_err());
    }

    #[test]
    fn test_milestone_memory() {
        let (mut agent, mut network, tuning) = setup();
        for tick in 0..10 {
            let session = open_session(&mut agent, &tuning, None);
            record_outcome(
                &mut agent,
                session,
                &fixtures::win(1.0),
                &mut network,
                SimTime::new(tick),
                &tuning,
            )
            .unwrap();
        }
        assert_eq!(
            agent
                .memory
                .records()
                .iter()
                .filter(|r| r.kind == MemoryKind::Milestone)
                .count(),
            1
        );
    }
}
