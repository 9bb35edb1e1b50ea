//! Trader Simulation Runner
//!
//! Seeds a population of random traders, feeds them synthetic stimuli for a
//! number of ticks with a seeded toy executor standing in for the market, and
//! writes the decision log and final agent snapshots.

use clap::Parser;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing::Level;

use trader_core::output::write_snapshots;
use trader_core::rng::AgentRng;
use trader_core::setup::{spawn_summary, SpawnConfig};
use trader_core::{AgentConfig, DecisionLog, DecisionRequest, OutcomeDelivery, Population, TuningConfig};
use trader_events::{
    Action, AgentId, CounterpartyBehavior, Decision, MarketSnapshot, NetworkContext, Opportunity,
    OpportunityType, Outcome, SimTime,
};

const EXECUTOR_SALT: u64 = 0x5eed_e8ec;
const MARKET_SALT: u64 = 0x3a12_4e7c;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "trader_sim")]
#[command(about = "Runs a seeded population of trader agents")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 240)]
    ticks: u64,

    /// Number of agents to spawn
    #[arg(long, default_value_t = 20)]
    agents: usize,

    /// Tuning file (defaults to ./tuning.toml when present)
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Directory for the decision log and snapshots
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Interval between progress reports (in ticks)
    #[arg(long, default_value_t = 24)]
    report_interval: u64,
}

/// Market backdrop shared by every agent on one tick.
fn market_for(seed: u64, tick: u64) -> MarketSnapshot {
    let mut rng = AgentRng::for_tick(seed ^ MARKET_SALT, &AgentId::from("market"), SimTime::new(tick));
    let wave = (tick as f64 / 24.0).sin();
    MarketSnapshot::new(
        (45.0 + 30.0 * wave.abs() + rng.noise(10.0)).clamp(0.0, 100.0),
        (60.0 * wave + rng.noise(20.0)).clamp(-100.0, 100.0),
        (60.0 - 25.0 * wave + rng.noise(15.0)).clamp(0.0, 100.0),
    )
}

/// A synthetic opportunity for one agent on one tick.
fn opportunity_for(seed: u64, agent: &AgentId, tick: u64, ids: &[AgentId]) -> Opportunity {
    let mut rng = AgentRng::for_tick(seed, agent, SimTime::new(tick));
    let kinds = OpportunityType::all();
    let kind = kinds[(rng.unit() * kinds.len() as f64) as usize % kinds.len()];
    let complexity = (rng.unit() * 100.0).floor();
    let mut opportunity = Opportunity::new(kind)
        .with_complexity(complexity)
        .with_asset(format!("ASSET_{}", (rng.unit() * 5.0) as u32));

    let others: Vec<&AgentId> = ids.iter().filter(|id| *id != agent).collect();
    let wants_partner = kind == OpportunityType::SocialTrade || rng.unit() < 0.2;
    if wants_partner && !others.is_empty() {
        let partner = others[(rng.unit() * others.len() as f64) as usize % others.len()];
        opportunity = opportunity.with_counterparty(partner.clone());
    } else if kind == OpportunityType::SocialTrade {
        opportunity.opportunity_type = OpportunityType::DayTrade;
    }
    opportunity
}

/// Toy executor: turns a decision into an outcome.
fn execute(seed: u64, decision: &Decision) -> Outcome {
    let mut rng = AgentRng::for_tick(seed ^ EXECUTOR_SALT, &decision.agent_id, decision.decided_at);
    let traded = matches!(decision.action, Action::Enter | Action::Negotiate | Action::Exit);
    let profit_loss = if traded {
        rng.noise(60.0) + (decision.confidence - 50.0) * 0.4 * decision.size / 100.0
    } else {
        0.0
    };

    let behavior = match decision.counterparty {
        Some(_) if traded => {
            let roll = rng.unit();
            if roll < 0.05 {
                CounterpartyBehavior::Betrayal
            } else if roll < 0.2 {
                CounterpartyBehavior::Cooperation
            } else if roll < 0.3 {
                CounterpartyBehavior::Failed
            } else {
                CounterpartyBehavior::Successful
            }
        }
        _ => CounterpartyBehavior::Successful,
    };
    let profit_loss = if behavior == CounterpartyBehavior::Betrayal {
        -profit_loss.abs() - 20.0
    } else {
        profit_loss
    };
    Outcome::new(profit_loss, behavior).with_unexpected(rng.unit() < 0.1)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let tuning = match &args.tuning {
        Some(path) => TuningConfig::from_file(path)?,
        None => TuningConfig::load_or_default(),
    };

    fs::create_dir_all(&args.output)?;
    let log = DecisionLog::new(args.output.join("decisions.jsonl"))?;

    let mut population = Population::new(args.seed, tuning);
    population.add_hook(Box::new(log));

    let spawn = SpawnConfig {
        count: args.agents,
        ..SpawnConfig::default()
    };
    let ids = population.spawn_random(&spawn, &AgentConfig::default())?;
    let summary = spawn_summary(population.agents().map(|a| &a.traits.current));
    tracing::info!(agents = summary.total_agents, "Spawned population");
    for (archetype, count) in &summary.by_archetype {
        tracing::info!(archetype = %archetype, count, "Archetype");
    }

    let mut decisions = 0usize;
    let mut dropped = 0usize;
    for tick in 1..=args.ticks {
        population.advance_to(SimTime::new(tick));
        let market = market_for(args.seed, tick);

        let requests: Vec<DecisionRequest> = ids
            .iter()
            .map(|id| {
                let opportunity = opportunity_for(args.seed, id, tick, &ids);
                let network = NetworkContext {
                    counterparty_trust: opportunity
                        .counterparty
                        .as_ref()
                        .map(|cp| population.trust(id, cp)),
                    community_size: 0,
                    peer_signals: Vec::new(),
                };
                DecisionRequest::new(id.clone(), opportunity, market).with_network(network)
            })
            .collect();

        let deliveries: Vec<OutcomeDelivery> = population
            .decide_batch(requests)
            .into_iter()
            .filter_map(|(agent_id, result)| {
                let decision = result.ok()?;
                Some(OutcomeDelivery {
                    agent_id,
                    session_id: decision.session_id,
                    outcome: execute(args.seed, &decision),
                })
            })
            .collect();
        decisions += deliveries.len();
        dropped += population
            .apply_outcomes(deliveries)
            .iter()
            .filter(|(_, result)| result.is_err())
            .count();

        if tick % args.report_interval.max(1) == 0 {
            tracing::info!(
                tick,
                decisions,
                dropped,
                edges = population.network().edge_count(),
                communities = population.communities().len(),
                "Progress"
            );
        }
    }

    let snapshots = population.snapshots();
    let written = write_snapshots(&snapshots, args.output.join("snapshots"))?;
    tracing::info!(
        files = written.len(),
        dir = %args.output.display(),
        "Wrote final snapshots"
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let args = Args::parse();
    tracing::info!(seed = args.seed, ticks = args.ticks, agents = args.agents, "Trader simulation");
    if let Err(e) = run(args) {
        tracing::error!(error = %e, "Simulation failed");
        std::process::exit(1);
    }
}
