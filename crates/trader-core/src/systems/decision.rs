//! Decision System
//!
//! Turns an opportunity, a market snapshot and the caller's view of the
//! network into a [`Decision`], consulting every cognitive store of the
//! agent along the way. Each stage appends to the reasoning trace.

use trader_events::{
    Action, Decision, MarketSnapshot, NetworkContext, Opportunity, OpportunityType,
    RelationshipQuality, SimTime,
};

use crate::components::agent::{Agent, EmotionSnapshot, Session, SessionPhase, StrategyChoice};
use crate::components::emotion::{EmotionEvent, EmotionEventKind, EmotionalInfluence};
use crate::components::memory::MemoryQuery;
use crate::components::relationship::DEFAULT_RELATIONSHIP_TRUST;
use crate::components::strategy::ContextBucket;
use crate::components::traits::{TraitId, TraitVector};
use crate::config::TuningConfig;
use crate::error::{CoreError, Result};
use crate::rng::AgentRng;

/// Position size at full conviction
pub const BASE_POSITION: f64 = 100.0;

/// Amplitude of the seeded confidence noise
pub const NOISE_AMPLITUDE: f64 = 2.0;

/// Confidence ceiling for a vetoed decision
pub const VETO_CONFIDENCE_CAP: f64 = 30.0;

/// Energy cost components
pub mod energy_costs {
    pub const BASE: f64 = 5.0;
    pub const INVOLVED: f64 = 3.0;
    pub const HIGH_RISK: f64 = 3.0;
    pub const EMOTIONAL: f64 = 2.0;
    /// Risk adjustment above which an action counts as high risk
    pub const HIGH_RISK_THRESHOLD: f64 = 10.0;
}

/// Working copy of a decision before it is emitted
#[derive(Debug, Clone, PartialEq)]
struct Draft {
    action: Action,
    size: f64,
    confidence: f64,
    risk: f64,
    timing: f64,
}

/// Decision tree keyed on opportunity type. Returns the draft and a
/// reasoning line naming the opportunity type.
fn base_decision(
    opportunity: &Opportunity,
    market: &MarketSnapshot,
    traits: &TraitVector,
    relationship_trust: f64,
) -> (Draft, String) {
    let confidence = traits.get(TraitId::Confidence);
    let risk_tolerance = traits.get(TraitId::RiskTolerance);
    let analytical = traits.get(TraitId::Analytical);
    let patience = traits.get(TraitId::Patience);
    let sociability = traits.get(TraitId::Sociability);
    let complexity = opportunity.complexity;

    let risk = (risk_tolerance - 50.0) * 0.2;
    let timing = (patience - 50.0) * 0.1;
    let kind = opportunity.opportunity_type;

    let (action, size, base_confidence, why) = match kind {
        OpportunityType::DayTrade => (
            Action::Enter,
            BASE_POSITION * risk_tolerance / 100.0,
            0.5 * confidence + 0.2 * risk_tolerance + 0.3 * (100.0 - complexity),
            format!("risk tolerance {:.0}", risk_tolerance),
        ),
        OpportunityType::Arbitrage => {
            let conf = 0.4 * confidence + 0.4 * analytical + 0.2 * market.liquidity;
            if market.liquidity < 30.0 {
                (Action::Abstain, 0.0, conf, format!("liquidity {:.0} too thin", market.liquidity))
            } else {
                (
                    Action::Enter,
                    BASE_POSITION * (0.5 + analytical / 200.0),
                    conf,
                    format!("analytical {:.0}", analytical),
                )
            }
        }
        OpportunityType::LongTerm => {
            let conf = 0.4 * confidence + 0.4 * patience + 0.2 * (100.0 - complexity);
            if complexity > 70.0 && analytical >= 50.0 {
                (Action::GatherInfo, 0.0, conf, format!("complexity {:.0} needs research", complexity))
            } else if patience >= 40.0 {
                (
                    Action::Enter,
                    BASE_POSITION * patience / 100.0,
                    conf,
                    format!("patience {:.0}", patience),
                )
            } else {
                (Action::Hold, 0.0, conf, format!("patience {:.0} too low to commit", patience))
            }
        }
        OpportunityType::SocialTrade => (
            Action::Negotiate,
            BASE_POSITION * sociability / 100.0,
            0.4 * confidence + 0.3 * sociability + 0.3 * relationship_trust,
            format!("sociability {:.0}", sociability),
        ),
    };

    let note = format!("{}: {} size {:.1} ({})", kind, action, size, why);
    (
        Draft {
            action,
            size,
            confidence: base_confidence,
            risk,
            timing,
        },
        note,
    )
}

/// Runs the full decision pipeline for one agent.
///
/// The pipeline works on a staged copy that replaces the agent only once
/// every step has succeeded, so a failed request leaves the agent unchanged.
/// On success the session is parked until its outcome arrives.
pub fn decide(
    agent: &mut Agent,
    opportunity: &Opportunity,
    market: &MarketSnapshot,
    network: &NetworkContext,
    now: SimTime,
    global_seed: u64,
    tuning: &TuningConfig,
) -> Result<Decision> {
    opportunity.validate()?;
    market.validate()?;
    network.validate()?;
    if opportunity.counterparty.as_ref() == Some(&agent.id) {
        return Err(CoreError::SelfInteraction(agent.id.clone()));
    }

    let mut staged = agent.clone();
    let decision = run_pipeline(&mut staged, opportunity, market, network, now, global_seed, tuning)?;
    *agent = staged;
    Ok(decision)
}

fn run_pipeline(
    agent: &mut Agent,
    opportunity: &Opportunity,
    market: &MarketSnapshot,
    network: &NetworkContext,
    now: SimTime,
    global_seed: u64,
    tuning: &TuningConfig,
) -> Result<Decision> {
    let counterparty = opportunity.counterparty.clone();
    let emotions = agent.config.enable_emotions;
    let mut rng = AgentRng::for_decision(global_seed, &agent.id, now, agent.decisions_made);
    let mut reasoning = Vec::new();

    // Session
    let session_id = rng.session_id();
    let emotion_at_open = EmotionSnapshot::capture(&agent.emotion);

    // Time
    agent.advance_to(now, tuning);
    if emotions && market.volatility > tuning.emotion.volatility_event_threshold {
        let event = EmotionEvent::new(EmotionEventKind::MarketVolatility, market.volatility);
        agent.emotion.process(event, &agent.traits.current, &tuning.emotion)?;
        reasoning.push(format!("volatility {:.0} unsettles the mood", market.volatility));
    }

    // Memory
    let policy = agent.retention_policy(tuning);
    let query = MemoryQuery::for_stimulus(opportunity, market);
    let recalled = agent.memory.recall(&query, now, policy);
    let recalled_count = recalled.len();
    let recalled_pl: Vec<f64> = recalled
        .iter()
        .filter_map(|r| r.record.payload.profit_loss)
        .collect();
    let prior_betrayal = counterparty.as_ref().and_then(|cp| {
        agent
            .memory
            .betrayals_by(cp)
            .last()
            .map(|r| (r.timestamp, r.payload.detail.clone()))
    });

    // Relationship
    let (stored_quality, relationship_trust) = match &counterparty {
        Some(cp) => agent.relationships.view(cp),
        None => (RelationshipQuality::Unknown, DEFAULT_RELATIONSHIP_TRUST),
    };
    let quality = if prior_betrayal.is_some() {
        RelationshipQuality::Avoid
    } else {
        stored_quality
    };

    // Base decision
    let traits = agent.traits.current.clone();
    let (mut draft, note) = base_decision(opportunity, market, &traits, relationship_trust);
    reasoning.push(note);

    let market_adjustment = 0.1 * market.trend
        - 0.3 * (market.volatility - 50.0).max(0.0)
        - 0.5 * (30.0 - market.liquidity).max(0.0);
    let fear_adjustment = -0.1 * (traits.get(TraitId::Fear) - 50.0);
    let noise = rng.noise(NOISE_AMPLITUDE);
    draft.confidence += market_adjustment + fear_adjustment + noise;
    reasoning.push(format!(
        "market volatility {:.0}, trend {:+.0}, liquidity {:.0}: confidence {:+.1}",
        market.volatility,
        market.trend,
        market.liquidity,
        market_adjustment + fear_adjustment
    ));

    if !recalled_pl.is_empty() {
        let mean = recalled_pl.iter().sum::<f64>() / recalled_pl.len() as f64;
        let adjustment = (mean * 0.05).clamp(-5.0, 5.0);
        draft.confidence += adjustment;
        reasoning.push(format!(
            "recalled {} memories, mean p/l {:+.1}: confidence {:+.1}",
            recalled_count, mean, adjustment
        ));
    } else if recalled_count > 0 {
        reasoning.push(format!("recalled {} memories", recalled_count));
    }

    if let Some(cp) = &counterparty {
        match quality {
            RelationshipQuality::TrustedPartner => {
                draft.confidence += 5.0;
                reasoning.push(format!("{} is a trusted partner", cp));
            }
            RelationshipQuality::ReliableContact => {
                draft.confidence += 3.0;
                reasoning.push(format!("{} is a reliable contact", cp));
            }
            RelationshipQuality::RiskyCounterparty => {
                draft.confidence -= 5.0;
                draft.size *= 0.7;
                reasoning.push(format!("{} is risky (trust {:.0}): size x0.7", cp, relationship_trust));
            }
            RelationshipQuality::Avoid => {
                draft.action = Action::Abstain;
                draft.size = 0.0;
                draft.confidence = draft.confidence.min(VETO_CONFIDENCE_CAP);
                match &prior_betrayal {
                    Some((at, detail)) => reasoning.push(format!(
                        "prior betrayal by {} at {}{}: refusing to deal, ABSTAIN",
                        cp,
                        at,
                        detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
                    )),
                    None => reasoning.push(format!("{} is to be avoided: ABSTAIN", cp)),
                }
            }
            RelationshipQuality::Neutral | RelationshipQuality::Unknown => {}
        }

        if let Some(network_trust) = network.counterparty_trust {
            if network_trust < 30.0 {
                draft.confidence -= 5.0;
                reasoning.push(format!("network trust in {} is only {:.0}", cp, network_trust));
            }
        }
    }
    if !network.peer_signals.is_empty() {
        reasoning.push(format!("{} peer signals noted", network.peer_signals.len()));
    }

    let exhausted = agent.is_exhausted(&tuning.agent);
    if exhausted {
        draft.action = Action::Abstain;
        draft.size = 0.0;
        reasoning.push(format!("exhausted (energy {:.0}): ABSTAIN", agent.energy));
    }

    // Emotion
    let influence = if emotions {
        agent.emotion.decision_impact(draft.action, &tuning.emotion)
    } else {
        EmotionalInfluence::neutral()
    };
    draft.confidence += influence.confidence_adjustment;
    draft.risk += influence.risk_adjustment;
    draft.timing += influence.timing_adjustment;
    draft.size = (draft.size * (1.0 + influence.risk_adjustment / 100.0)).max(0.0);
    reasoning.extend(influence.reasoning.iter().cloned());

    let emotional_override = match influence.override_action {
        Some(forced) => {
            draft.action = forced;
            draft.confidence -= tuning.emotion.override_confidence_penalty;
            true
        }
        None => false,
    };

    if emotions {
        if let Some(record) = agent.emotion.regulate(&traits, &tuning.emotion, now) {
            reasoning.push(format!(
                "regulated {} via {} ({:.0} -> {:.0})",
                record.emotion,
                record.strategy.as_str(),
                record.before,
                record.after
            ));
        }
    }

    // Strategy
    let bucket = ContextBucket::classify(opportunity.opportunity_type, market);
    let mut strategy_tag = None;
    let mut choice = None;
    if let Some(adapted) = agent.strategies.adapted_strategy(bucket, &traits, now, &tuning.strategy) {
        agent
            .strategies
            .mark_used(&adapted.strategy_id, now, &tuning.strategy)?;
        let threshold = tuning.strategy.tag_confidence;
        if agent.config.enable_specialization && adapted.confidence > threshold {
            let span = (100.0 - threshold).max(f64::MIN_POSITIVE);
            let bonus = ((adapted.confidence - threshold) / span * tuning.strategy.max_confidence_bonus)
                .clamp(0.0, tuning.strategy.max_confidence_bonus);
            draft.confidence += bonus;
            let mut line = format!(
                "strategy {} ({:.0}% fit for {}): confidence +{:.1}",
                adapted.strategy_id, adapted.confidence, bucket, bonus
            );
            if !adapted.adaptations.is_empty() {
                line.push_str(&format!(" [{}]", adapted.adaptations.join("; ")));
            }
            reasoning.push(line);
            strategy_tag = Some(adapted.strategy_id.clone());
        }
        choice = Some(StrategyChoice {
            strategy_id: adapted.strategy_id,
            bucket,
        });
    }

    // Agent state
    let confidence = draft.confidence.clamp(0.0, 100.0);
    let cost = if exhausted {
        0.0
    } else {
        let mut cost = energy_costs::BASE;
        if draft.action.is_involved() {
            cost += energy_costs::INVOLVED;
        }
        if draft.risk > energy_costs::HIGH_RISK_THRESHOLD {
            cost += energy_costs::HIGH_RISK;
        }
        if emotional_override {
            cost += energy_costs::EMOTIONAL;
        }
        cost
    };
    agent.energy = (agent.energy - cost).max(0.0);
    let mut stress_gain = draft.risk.max(0.0) * 0.2;
    if draft.action.is_entry() {
        stress_gain += draft.size / BASE_POSITION * 2.0;
    }
    if emotional_override {
        stress_gain += 5.0;
    }
    agent.stress = (agent.stress + stress_gain).min(100.0);
    agent.confidence = (0.8 * agent.confidence + 0.2 * confidence).clamp(0.0, 100.0);
    agent.decisions_made += 1;
    if now > agent.last_activity {
        agent.last_activity = now;
    }

    let target = opportunity
        .asset
        .clone()
        .or_else(|| counterparty.as_ref().map(|cp| cp.to_string()));
    let decision = Decision {
        session_id,
        agent_id: agent.id.clone(),
        opportunity_type: opportunity.opportunity_type,
        action: draft.action,
        target,
        counterparty: counterparty.clone(),
        size: draft.size,
        confidence,
        risk_adjustment: draft.risk,
        timing_adjustment: draft.timing,
        emotional_override,
        strategy: strategy_tag,
        relationship_quality: counterparty.as_ref().map(|_| quality),
        reasoning,
        decided_at: now,
    };

    tracing::debug!(
        agent = %agent.id,
        session = %session_id,
        action = %decision.action,
        confidence = decision.confidence,
        "Decision made"
    );

    let session = Session {
        id: session_id,
        opened_at: now,
        phase: SessionPhase::Deciding,
        opportunity: opportunity.clone(),
        market: *market,
        action: decision.action,
        confidence,
        strategy: choice,
        emotion_at_open,
    };
    if let Some(dropped) = agent.park_session(session, tuning.agent.pending_session_limit) {
        tracing::warn!(
            agent = %agent.id,
            session = %dropped.id,
            "Pending session limit reached; dropping oldest session"
        );
    }

    Ok(decision)
}
