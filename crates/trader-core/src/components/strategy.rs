//! Strategy Store
//!
//! Named trading strategies with a fixed parameter schema and a fitness per
//! context bucket. Fitness follows an exponential moving average of outcome
//! scores; strategies that keep scoring poorly are retired, not deleted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use trader_events::{CounterpartyBehavior, MarketSnapshot, OpportunityType, Outcome, SimTime};

use crate::components::traits::{TraitId, TraitVector};
use crate::config::StrategyTuning;
use crate::error::{CoreError, Result};

/// Coarse market classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Calm,
    Trending,
    Volatile,
    Illiquid,
}

impl MarketRegime {
    /// Volatility dominates, then liquidity, then trend.
    pub fn classify(market: &MarketSnapshot) -> Self {
        if market.volatility > 70.0 {
            MarketRegime::Volatile
        } else if market.liquidity < 30.0 {
            MarketRegime::Illiquid
        } else if market.trend.abs() > 30.0 {
            MarketRegime::Trending
        } else {
            MarketRegime::Calm
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketRegime::Calm => "calm",
            MarketRegime::Trending => "trending",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Illiquid => "illiquid",
        }
    }

    pub fn all() -> &'static [MarketRegime] {
        &[
            MarketRegime::Calm,
            MarketRegime::Trending,
            MarketRegime::Volatile,
            MarketRegime::Illiquid,
        ]
    }
}

/// Opportunity type crossed with market regime. Serialized as
/// `"<opportunity>/<regime>"` so it can key a JSON map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContextBucket {
    pub opportunity_type: OpportunityType,
    pub regime: MarketRegime,
}

impl ContextBucket {
    pub fn new(opportunity_type: OpportunityType, regime: MarketRegime) -> Self {
        Self {
            opportunity_type,
            regime,
        }
    }

    pub fn classify(opportunity_type: OpportunityType, market: &MarketSnapshot) -> Self {
        Self::new(opportunity_type, MarketRegime::classify(market))
    }
}

impl fmt::Display for ContextBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.opportunity_type, self.regime.as_str())
    }
}

impl From<ContextBucket> for String {
    fn from(bucket: ContextBucket) -> Self {
        bucket.to_string()
    }
}

impl TryFrom<String> for ContextBucket {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let (ot, regime) = s
            .split_once('/')
            .ok_or_else(|| format!("malformed context bucket: {}", s))?;
        let opportunity_type = ot.parse::<OpportunityType>().map_err(|e| e.to_string())?;
        let regime = MarketRegime::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == regime)
            .ok_or_else(|| format!("unknown market regime: {}", regime))?;
        Ok(Self::new(opportunity_type, regime))
    }
}

/// Fixed parameter schema shared by every strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyParameters {
    /// Multiplier on position size
    pub position_scale: f64,
    /// Minimum signal strength to act, 0 to 1
    pub entry_threshold: f64,
    /// Intended holding period in ticks
    pub holding_period: f64,
    /// Fractional stop distance
    pub stop_loss: f64,
}

impl StrategyParameters {
    pub fn new(position_scale: f64, entry_threshold: f64, holding_period: f64, stop_loss: f64) -> Self {
        Self {
            position_scale,
            entry_threshold,
            holding_period,
            stop_loss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Strategy {
    pub id: String,
    pub parameters: StrategyParameters,
    /// Opportunity types this strategy applies to
    pub context_tags: Vec<OpportunityType>,
    pub fitness: BTreeMap<ContextBucket, f64>,
    pub usage_count: u64,
    pub last_used: Option<SimTime>,
    pub active: bool,
    /// Selection times inside the current rate-limit window
    pub recent_uses: VecDeque<SimTime>,
    /// Latest outcome scores, newest last
    pub recent_scores: VecDeque<f64>,
    /// Consecutive learns that left fitness under the retirement floor
    pub low_streak: u32,
}

impl Strategy {
    pub fn new(id: impl Into<String>, parameters: StrategyParameters, context_tags: Vec<OpportunityType>) -> Self {
        Self {
            id: id.into(),
            parameters,
            context_tags,
            fitness: BTreeMap::new(),
            usage_count: 0,
            last_used: None,
            active: true,
            recent_uses: VecDeque::new(),
            recent_scores: VecDeque::new(),
            low_streak: 0,
        }
    }

    pub fn applies_to(&self, opportunity_type: OpportunityType) -> bool {
        self.context_tags.contains(&opportunity_type)
    }

    pub fn fitness_for(&self, bucket: &ContextBucket, tuning: &StrategyTuning) -> f64 {
        self.fitness.get(bucket).copied().unwrap_or(tuning.initial_fitness)
    }

    /// Share of recent scores that count as failures.
    pub fn failure_rate(&self, tuning: &StrategyTuning) -> f64 {
        let window: Vec<f64> = self
            .recent_scores
            .iter()
            .rev()
            .take(tuning.failure_window)
            .copied()
            .collect();
        if window.is_empty() {
            return 0.0;
        }
        window.iter().filter(|&&s| s < tuning.failure_score).count() as f64 / window.len() as f64
    }

    pub fn is_rate_limited(&self, now: SimTime, tuning: &StrategyTuning) -> bool {
        let in_window = self
            .recent_uses
            .iter()
            .filter(|&&t| now.ticks_since(t) < tuning.rate_limit_window)
            .count();
        in_window >= tuning.rate_limit_max
    }
}

/// The five strategies every agent starts with.
pub fn default_strategies() -> Vec<Strategy> {
    use OpportunityType::*;
    vec![
        Strategy::new("momentum", StrategyParameters::new(1.0, 0.6, 4.0, 0.05), vec![DayTrade]),
        Strategy::new(
            "mean_reversion",
            StrategyParameters::new(0.8, 0.5, 12.0, 0.04),
            vec![DayTrade, LongTerm],
        ),
        Strategy::new("spread_capture", StrategyParameters::new(1.2, 0.3, 1.0, 0.02), vec![Arbitrage]),
        Strategy::new(
            "value_accumulation",
            StrategyParameters::new(0.6, 0.7, 240.0, 0.15),
            vec![LongTerm],
        ),
        Strategy::new(
            "relationship_broker",
            StrategyParameters::new(0.9, 0.5, 24.0, 0.08),
            vec![SocialTrade],
        ),
    ]
}

/// Strategy chosen for a context, with its regime adaptations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptedStrategy {
    pub strategy_id: String,
    pub bucket: ContextBucket,
    pub parameters: StrategyParameters,
    pub adaptations: Vec<String>,
    /// 0 to 100
    pub confidence: f64,
}

/// Fitness change from one learn call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnReport {
    pub strategy_id: String,
    pub score: f64,
    pub fitness_before: f64,
    pub fitness_after: f64,
    pub retired: bool,
}

/// Maps an outcome to a score in [0, 1].
pub fn outcome_score(outcome: &Outcome) -> f64 {
    let mut score = 0.5 + 0.5 * (outcome.profit_loss / 100.0).tanh();
    match outcome.counterparty_behavior {
        CounterpartyBehavior::Betrayal => score *= 0.5,
        CounterpartyBehavior::Cooperation => score += 0.1,
        CounterpartyBehavior::Successful | CounterpartyBehavior::Failed => {}
    }
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyStore {
    strategies: BTreeMap<String, Strategy>,
}

impl StrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for strategy in default_strategies() {
            store.register(strategy);
        }
        store
    }

    /// Adds or replaces a strategy. Returns the replaced one.
    pub fn register(&mut self, strategy: Strategy) -> Option<Strategy> {
        self.strategies.insert(strategy.id.clone(), strategy)
    }

    pub fn get(&self, id: &str) -> Option<&Strategy> {
        self.strategies.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Highest-fitness active, applicable, non-rate-limited strategy for
    /// the bucket, with regime and temperament adaptations applied.
    pub fn adapted_strategy(
        &self,
        bucket: ContextBucket,
        traits: &TraitVector,
        now: SimTime,
        tuning: &StrategyTuning,
    ) -> Option<AdaptedStrategy> {
        let mut best: Option<(&Strategy, f64)> = None;
        for strategy in self.strategies.values() {
            if !strategy.active
                || !strategy.applies_to(bucket.opportunity_type)
                || strategy.is_rate_limited(now, tuning)
            {
                continue;
            }
            let fitness = strategy.fitness_for(&bucket, tuning);
            if best.map_or(true, |(_, f)| fitness > f) {
                best = Some((strategy, fitness));
            }
        }
        let (strategy, fitness) = best?;

        let mut parameters = strategy.parameters;
        let mut adaptations = Vec::new();
        match bucket.regime {
            MarketRegime::Volatile => {
                parameters.position_scale *= 0.7;
                adaptations.push("volatile market: size x0.7".to_string());
            }
            MarketRegime::Illiquid => {
                parameters.position_scale *= 0.5;
                adaptations.push("illiquid market: size x0.5".to_string());
            }
            MarketRegime::Trending => {
                parameters.entry_threshold = (parameters.entry_threshold - 0.1).max(0.0);
                adaptations.push("trending market: entry threshold -0.1".to_string());
            }
            MarketRegime::Calm => {}
        }
        if traits.get(TraitId::Patience) > 70.0 {
            parameters.holding_period *= 1.5;
            adaptations.push("patient temperament: holding x1.5".to_string());
        }

        let confidence = (fitness * (1.0 - strategy.failure_rate(tuning)) * 100.0).clamp(0.0, 100.0);
        Some(AdaptedStrategy {
            strategy_id: strategy.id.clone(),
            bucket,
            parameters,
            adaptations,
            confidence,
        })
    }

    /// Records that a strategy was selected at `now`.
    pub fn mark_used(&mut self, id: &str, now: SimTime, tuning: &StrategyTuning) -> Result<()> {
        let strategy = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownStrategy(id.to_string()))?;
        strategy.usage_count += 1;
        strategy.last_used = Some(now);
        strategy.recent_uses.push_back(now);
        while let Some(&oldest) = strategy.recent_uses.front() {
            if now.ticks_since(oldest) >= tuning.rate_limit_window {
                strategy.recent_uses.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Folds an outcome score into the strategy's bucket fitness. With
    /// learning disabled fitness stays frozen.
    pub fn learn(
        &mut self,
        id: &str,
        bucket: ContextBucket,
        score: f64,
        tuning: &StrategyTuning,
        enabled: bool,
    ) -> Result<LearnReport> {
        CoreError::check_bounds("score", score, 0.0, 1.0)?;
        let strategy = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownStrategy(id.to_string()))?;
        let before = strategy.fitness_for(&bucket, tuning);
        if !enabled {
            return Ok(LearnReport {
                strategy_id: id.to_string(),
                score,
                fitness_before: before,
                fitness_after: before,
                retired: false,
            });
        }

        let alpha = tuning.ema_alpha.clamp(0.0, 1.0);
        let after = ((1.0 - alpha) * before + alpha * score).clamp(0.0, 1.0);
        strategy.fitness.insert(bucket, after);

        strategy.recent_scores.push_back(score);
        while strategy.recent_scores.len() > tuning.failure_window.max(1) {
            strategy.recent_scores.pop_front();
        }

        if after < tuning.retirement_floor {
            strategy.low_streak += 1;
        } else {
            strategy.low_streak = 0;
        }
        let retired = strategy.active && strategy.low_streak >= tuning.retirement_streak;
        if retired {
            strategy.active = false;
            tracing::info!(strategy = %id, fitness = after, "Strategy retired");
        }

        Ok(LearnReport {
            strategy_id: id.to_string(),
            score,
            fitness_before: before,
            fitness_after: after,
            retired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm_day_trade() -> ContextBucket {
        ContextBucket::new(OpportunityType::DayTrade, MarketRegime::Calm)
    }

    #[test]
    fn test_regimes() {
        assert_eq!(MarketRegime::classify(&MarketSnapshot::new(80.0, 50.0, 10.0)), MarketRegime::Volatile);
        assert_eq!(MarketRegime::classify(&MarketSnapshot::new(40.0, 50.0, 10.0)), MarketRegime::Illiquid);
        assert_eq!(MarketRegime::classify(&MarketSnapshot::new(40.0, -50.0, 60.0)), MarketRegime::Trending);
        assert_eq!(MarketRegime::classify(&MarketSnapshot::new(40.0, 10.0, 60.0)), MarketRegime::Calm);
    }

    #[test]
    fn test_bucket_string_form() {
        let bucket = ContextBucket::new(OpportunityType::LongTerm, MarketRegime::Volatile);
        assert_eq!(serde_json::to_string(&bucket).unwrap(), "\"long_term/volatile\"");
        let back: ContextBucket = serde_json::from_str("\"long_term/volatile\"").unwrap();
        assert_eq!(back, bucket);
        assert!(serde_json::from_str::<ContextBucket>("\"long_term/stormy\"").is_err());
    }

    #[test]
    fn test_selection_prefers_fitness_then_name() {
        let mut store = StrategyStore::with_defaults();
        let tuning = StrategyTuning::default();
        let traits = TraitVector::new();
        let picked = store
            .adapted_strategy(calm_day_trade(), &traits, SimTime::ZERO, &tuning)
            .unwrap();
        assert_eq!(picked.strategy_id, "mean_reversion");
        assert!((picked.confidence - 60.0).abs() < 1e-9);

        store.learn("momentum", calm_day_trade(), 1.0, &tuning, true).unwrap();
        let picked = store
            .adapted_strategy(calm_day_trade(), &traits, SimTime::ZERO, &tuning)
            .unwrap();
        assert_eq!(picked.strategy_id, "momentum");
    }

    #[test]
    fn test_rate_limit_falls_through() {
        let mut store = StrategyStore::with_defaults();
        let tuning = StrategyTuning::default();
        for tick in 0..6 {
            store.mark_used("mean_reversion", SimTime::new(tick), &tuning).unwrap();
        }
        let picked = store
            .adapted_strategy(calm_day_trade(), &TraitVector::new(), SimTime::new(6), &tuning)
            .unwrap();
        assert_eq!(picked.strategy_id, "momentum");

        let later = store
            .adapted_strategy(calm_day_trade(), &TraitVector::new(), SimTime::new(12), &tuning)
            .unwrap();
        assert_eq!(later.strategy_id, "mean_reversion");
    }

    #[test]
    fn test_regime_adaptations() {
        let store = StrategyStore::with_defaults();
        let patient = TraitVector::from_pairs(&[(TraitId::Patience, 80.0)]).unwrap();
        let bucket = ContextBucket::new(OpportunityType::Arbitrage, MarketRegime::Illiquid);
        let picked = store
            .adapted_strategy(bucket, &patient, SimTime::ZERO, &StrategyTuning::default())
            .unwrap();
        assert_eq!(picked.strategy_id, "spread_capture");
        assert!((picked.parameters.position_scale - 0.6).abs() < 1e-9);
        assert!((picked.parameters.holding_period - 1.5).abs() < 1e-9);
        assert_eq!(picked.adaptations.len(), 2);
    }

    #[test]
    fn test_learning_disabled_freezes_fitness() {
        let mut store = StrategyStore::with_defaults();
        let tuning = StrategyTuning::default();
        let report = store.learn("momentum", calm_day_trade(), 0.0, &tuning, false).unwrap();
        assert_eq!(report.fitness_after, report.fitness_before);
        assert!(store.get("momentum").unwrap().fitness.is_empty());
    }

    #[test]
    fn test_retirement_after_streak() {
        let mut store = StrategyStore::with_defaults();
        let tuning = StrategyTuning::default();
        let mut retired = false;
        for _ in 0..30 {
            retired |= store.learn("momentum", calm_day_trade(), 0.0, &tuning, true).unwrap().retired;
        }
        assert!(retired);
        let momentum = store.get("momentum").unwrap();
        assert!(!momentum.active);
        assert_eq!(momentum.failure_rate(&tuning), 1.0);
    }

    #[test]
    fn test_unknown_strategy() {
        let mut store = StrategyStore::with_defaults();
        let err = store
            .learn("martingale", calm_day_trade(), 0.5, &StrategyTuning::default(), true)
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_outcome_scores() {
        let flat = Outcome::new(0.0, CounterpartyBehavior::Successful);
        assert_eq!(outcome_score(&flat), 0.5);
        let betrayed = Outcome::new(0.0, CounterpartyBehavior::Betrayal);
        assert_eq!(outcome_score(&betrayed), 0.25);
        let big_win = Outcome::new(500.0, CounterpartyBehavior::Cooperation);
        assert_eq!(outcome_score(&big_win), 1.0);
    }
}
