//! Sample data fixtures for testing.
//!
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // trader-events = { path = "../trader-events", features = ["test-fixtures"] }
//!
//! use trader_events::fixtures;
//!
//! let opportunity = fixtures::day_trade();
//! let market = fixtures::steady_market();
//! ```

use crate::{CounterpartyBehavior, MarketSnapshot, Opportunity, OpportunityType, Outcome};

/// A day trade of medium complexity with no counterparty.
pub fn day_trade() -> Opportunity {
    Opportunity::new(OpportunityType::DayTrade).with_complexity(50.0)
}

/// A social trade with the given counterparty.
pub fn social_trade(counterparty: &str) -> Opportunity {
    Opportunity::new(OpportunityType::SocialTrade)
        .with_counterparty(counterparty)
        .with_complexity(40.0)
}

/// Moderate volatility, slight uptrend, healthy liquidity.
pub fn steady_market() -> MarketSnapshot {
    MarketSnapshot::new(40.0, 10.0, 60.0)
}

/// A market that triggers the volatility reaction.
pub fn volatile_market() -> MarketSnapshot {
    MarketSnapshot::new(85.0, -30.0, 45.0)
}

/// A winning trade with a cooperative counterparty.
pub fn win(profit: f64) -> Outcome {
    Outcome::new(profit, CounterpartyBehavior::Successful)
}

/// A betrayal with a heavy loss.
pub fn betrayal(loss: f64) -> Outcome {
    Outcome::new(-loss.abs(), CounterpartyBehavior::Betrayal).with_unexpected(true)
}

/// A rotating set of stimuli for multi-tick runs.
pub fn stimulus_cycle(tick: u64) -> (Opportunity, MarketSnapshot) {
    let kinds = OpportunityType::all();
    let kind = kinds[(tick as usize) % kinds.len()];
    let mut opportunity = Opportunity::new(kind)
        .with_asset(format!("ASSET_{}", tick % 3))
        .with_complexity((tick * 17 % 100) as f64);
    if kind == OpportunityType::SocialTrade {
        opportunity = opportunity.with_counterparty(format!("cp_{}", tick % 4).as_str());
    }
    let market = MarketSnapshot::new(
        (tick * 23 % 100) as f64,
        ((tick * 37 % 200) as f64) - 100.0,
        (tick * 11 % 100) as f64,
    );
    (opportunity, market)
}
