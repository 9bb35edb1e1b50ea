//! End-to-end behavior tests
//!
//! Walks the agent through the situations it is built for: a plain seeded
//! decision, a panic override, betrayal gossip, remembering who cheated,
//! surviving export/import mid-run, and forgetting what no longer matters.

use trader_core::systems::decide;
use trader_core::{
    Agent, AgentConfig, EmotionKind, Interaction, InteractionKind, MemoryKind, MemoryPayload, MemoryStore,
    Population, RetentionPolicy, TraitId, TraitVector, TrustDimensions, TrustNetwork, TuningConfig,
};
use trader_events::{
    fixtures, Action, AgentId, CounterpartyBehavior, Decision, NetworkContext, Opportunity, OpportunityType,
    Outcome, RelationshipQuality, SimTime,
};

fn bold_traits() -> TraitVector {
    TraitVector::from_pairs(&[
        (TraitId::RiskTolerance, 80.0),
        (TraitId::Fear, 20.0),
        (TraitId::Confidence, 70.0),
    ])
    .unwrap()
}

fn day_trade_decision(agent: &mut Agent) -> Decision {
    let opportunity = Opportunity::new(OpportunityType::DayTrade).with_complexity(50.0);
    decide(
        agent,
        &opportunity,
        &fixtures::steady_market(),
        &NetworkContext::default(),
        SimTime::ZERO,
        42,
        &TuningConfig::default(),
    )
    .unwrap()
}

/// A bold trader takes a calm day trade
#[test]
fn test_seeded_one_tick_decision() {
    let mut agent = Agent::new(AgentId::from("bold"), AgentConfig::default(), bold_traits(), SimTime::ZERO);
    let decision = day_trade_decision(&mut agent);

    assert_eq!(decision.action, Action::Enter, "Bold trader should enter");
    assert!(
        (decision.size - 80.0).abs() < 1e-9,
        "Size should scale with risk tolerance, got {}",
        decision.size
    );
    assert!(
        (60.0..=80.0).contains(&decision.confidence),
        "Confidence {} out of range",
        decision.confidence
    );
    assert!(decision.mentions("day_trade"));
    assert!(!decision.emotional_override);
}

/// Panic forces an exit and costs confidence
#[test]
fn test_panic_override() {
    let tuning = TuningConfig::default();
    let mut calm = Agent::new(AgentId::from("bold"), AgentConfig::default(), bold_traits(), SimTime::ZERO);
    let mut panicked = calm.clone();
    panicked
        .emotion
        .set_intensity(EmotionKind::Panic, 75.0, &tuning.emotion)
        .unwrap();

    let baseline = day_trade_decision(&mut calm);
    let decision = day_trade_decision(&mut panicked);

    assert_eq!(decision.action, Action::Exit, "Panic should force an exit");
    assert!(decision.emotional_override);
    assert!(
        baseline.confidence - decision.confidence >= 30.0 - 1e-9,
        "Confidence should drop by at least 30 ({} -> {})",
        baseline.confidence,
        decision.confidence
    );
    assert!(decision.mentions("EMOTIONAL OVERRIDE"));
}

/// News of a betrayal reaches the third party
#[test]
fn test_betrayal_propagation() {
    let tuning = TuningConfig::default();
    let mut network = TrustNetwork::new(tuning.trust.clone(), tuning.clock.ticks_per_day);
    let (a, b, c) = (AgentId::from("a"), AgentId::from("b"), AgentId::from("c"));
    for (x, y) in [(&a, &b), (&a, &c), (&b, &c)] {
        network.connect(x, y, TrustDimensions::uniform(70.0), None).unwrap();
    }
    let ab_before = network.trust(&a, &b);
    let ca_before = network.trust(&c, &a);

    let betrayal = Interaction::new(InteractionKind::Betrayal, 100.0);
    network.observe(&a, &b, betrayal).unwrap();
    let adjustments = network.propagate(&a, &b, betrayal).unwrap();

    let ab_drop = ab_before - network.trust(&a, &b);
    let ca_drop = ca_before - network.trust(&c, &a);
    assert!(ab_drop >= 40.0, "Direct trust should collapse, dropped {}", ab_drop);
    assert!(ca_drop >= 5.0, "Indirect trust should drop, dropped {}", ca_drop);
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].observer, c);
    assert_eq!(adjustments[0].hop, 1);
}

/// A remembered betrayal keeps the agent away from the betrayer
#[test]
fn test_memory_relevance() {
    let mut population = Population::new(42, TuningConfig::default());
    let trader = population
        .create_agent(AgentId::from("trader"), AgentConfig::default())
        .unwrap();
    let cheat = AgentId::from("x");

    population.record_betrayal(&trader, &cheat, "front_running", 70.0).unwrap();
    population.advance(48);

    let decision = population
        .decide(&trader, &fixtures::social_trade("x"), &fixtures::steady_market(), &NetworkContext::default())
        .unwrap();
    assert_eq!(decision.relationship_quality, Some(RelationshipQuality::Avoid));
    assert!(
        decision.action == Action::Abstain || decision.confidence < 40.0,
        "Should refuse or hedge, got {} at {}",
        decision.action,
        decision.confidence
    );
    assert!(decision.mentions("prior betrayal"), "Reasoning: {}", decision.reasoning_text());
}

fn outcome_for(tick: u64, decision: &Decision) -> Outcome {
    let traded = matches!(decision.action, Action::Enter | Action::Exit | Action::Negotiate);
    let profit = match (traded, tick % 4) {
        (false, _) => 0.0,
        (true, 0) => -30.0,
        (true, _) => 20.0,
    };
    let behavior = match decision.counterparty {
        Some(_) if tick % 9 == 0 => CounterpartyBehavior::Betrayal,
        Some(_) => CounterpartyBehavior::Cooperation,
        None => CounterpartyBehavior::Successful,
    };
    Outcome::new(profit, behavior).with_unexpected(tick % 11 == 0)
}

fn run_ticks(population: &mut Population, ids: &[AgentId], from: u64, to: u64) {
    for tick in from..=to {
        population.advance_to(SimTime::new(tick));
        for (offset, id) in ids.iter().enumerate() {
            let (opportunity, market) = fixtures::stimulus_cycle(tick * 2 + offset as u64);
            let decision = population
                .decide(id, &opportunity, &market, &NetworkContext::default())
                .unwrap();
            population
                .record_outcome(id, decision.session_id, &outcome_for(tick, &decision))
                .unwrap();
        }
    }
}

fn seeded_population() -> (Population, Vec<AgentId>) {
    let mut population = Population::new(42, TuningConfig::default());
    let alice = population
        .create_agent_with_traits(AgentId::from("alice"), AgentConfig::default(), bold_traits())
        .unwrap();
    let bob = population
        .create_agent(AgentId::from("bob"), AgentConfig::default())
        .unwrap();
    (population, vec![alice, bob])
}

/// Exporting mid-run and importing elsewhere changes nothing
#[test]
fn test_round_trip_mid_run() {
    let (mut straight, ids) = seeded_population();
    run_ticks(&mut straight, &ids, 1, 200);

    let (mut first_half, _) = seeded_population();
    run_ticks(&mut first_half, &ids, 1, 100);
    let json: Vec<String> = ids
        .iter()
        .map(|id| first_half.export(id).unwrap().to_json().unwrap())
        .collect();

    let mut second_half = Population::new(42, TuningConfig::default());
    second_half.advance_to(SimTime::new(100));
    for (id, text) in ids.iter().zip(json.iter()) {
        let serialized = trader_core::SerializedAgent::from_json(text).unwrap();
        second_half.import(id, serialized).unwrap();
    }
    run_ticks(&mut second_half, &ids, 101, 200);

    for id in &ids {
        assert_eq!(
            straight.snapshot_bytes(id).unwrap(),
            second_half.snapshot_bytes(id).unwrap(),
            "Snapshot of {} should survive the round trip",
            id
        );
    }
}

/// A tampered export is refused and the live agent is kept
#[test]
fn test_tampered_import_rejected() {
    let (mut population, ids) = seeded_population();
    run_ticks(&mut population, &ids, 1, 24);
    let alice = &ids[0];
    let before = population.snapshot_bytes(alice).unwrap();
    let json = population.export(alice).unwrap().to_json().unwrap();
    let clean: serde_json::Value = serde_json::from_str(&json).unwrap();

    for (field, value) in [("energy", 500.0), ("stress", -40.0), ("confidence", 101.0)] {
        let mut tampered = clean.clone();
        tampered[field] = serde_json::json!(value);
        let serialized: trader_core::SerializedAgent = serde_json::from_value(tampered).unwrap();
        assert!(
            population.import(alice, serialized).is_err(),
            "{} = {} should be refused",
            field,
            value
        );
    }

    let mut tampered = clean.clone();
    tampered["emotion"]["valence"] = serde_json::json!(-250.0);
    let serialized: trader_core::SerializedAgent = serde_json::from_value(tampered).unwrap();
    assert!(population.import(alice, serialized).is_err());

    let mut tampered = clean;
    tampered["emotion"]
        .as_object_mut()
        .unwrap()
        .insert("bogus".to_string(), serde_json::json!(1));
    assert!(trader_core::SerializedAgent::from_json(&tampered.to_string()).is_err());

    assert_eq!(population.snapshot_bytes(alice).unwrap(), before, "Live agent should be untouched");
}

/// Old, unremarkable memories fade; crystallized ones never do
#[test]
fn test_retention_pruning() {
    let tuning = TuningConfig::default();
    let retention_days = AgentConfig::default().memory_retention_days;
    let policy = RetentionPolicy::new(&tuning.memory, retention_days, tuning.clock.ticks_per_day);
    let mut store = MemoryStore::new();

    let mut kept = Vec::new();
    for i in 0..5 {
        let payload = MemoryPayload::default().with_detail(format!("crash {}", i));
        kept.push(store.record(MemoryKind::Trade, payload, None, 95.0, SimTime::ZERO, policy).unwrap());
    }
    for i in 0..1000 {
        let payload = MemoryPayload::default().with_detail(format!("routine {}", i));
        store.record(MemoryKind::Trade, payload, None, 5.0, SimTime::ZERO, policy).unwrap();
    }
    assert!(store.len() <= tuning.memory.capacity);

    let later = SimTime::new(SimTime::days_to_ticks(retention_days + 1, tuning.clock.ticks_per_day));
    let report = store.decay_and_prune(later, policy);

    assert!(store.len() <= tuning.memory.capacity);
    assert!(report.removed > 0, "Stale low-impact memories should be pruned");
    for id in kept {
        let record = store.get(id).expect("crystallized record should survive");
        assert!(record.crystallized);
    }
    assert_eq!(store.len(), 5);
}
