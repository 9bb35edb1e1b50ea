//! Configuration
//!
//! Two layers: [`AgentConfig`] holds the per-agent switches that travel with an
//! exported agent, and [`TuningConfig`] holds deployment constants loaded from
//! `tuning.toml` so they can be adjusted without recompiling.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::components::trust::TrustDimensions;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Per-agent feature switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// When false the emotion engine is a no-op that reports neutral influence
    pub enable_emotions: bool,
    /// When false strategy fitness is frozen
    pub enable_learning: bool,
    /// When false decisions are never tagged with a strategy
    pub enable_specialization: bool,
    /// When false relationship and trust-network updates are skipped
    pub enable_networking: bool,
    /// Records older than this with sub-threshold impact are pruned
    pub memory_retention_days: u64,
    /// When false traits never drift
    pub personality_evolution: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enable_emotions: true,
            enable_learning: true,
            enable_specialization: true,
            enable_networking: true,
            memory_retention_days: 90,
            personality_evolution: true,
        }
    }
}

/// Deployment tuning for every subsystem.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TuningConfig {
    #[serde(default)]
    pub clock: ClockTuning,
    #[serde(default)]
    pub traits: TraitTuning,
    #[serde(default)]
    pub emotion: EmotionTuning,
    #[serde(default)]
    pub memory: MemoryTuning,
    #[serde(default)]
    pub trust: TrustTuning,
    #[serde(default)]
    pub strategy: StrategyTuning,
    #[serde(default)]
    pub agent: AgentTuning,
}

impl TuningConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let tuning: Self = toml::from_str(content)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Rejects values the subsystems cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.ticks_per_day == 0 {
            return Err(ConfigError::invalid("clock.ticks_per_day", "must be at least 1"));
        }

        let traits = &self.traits;
        at_least("traits.per_tick_cap", traits.per_tick_cap, 0.0)?;
        at_least("traits.lifetime_cap", traits.lifetime_cap, 0.0)?;
        at_least("traits.evolution_threshold", traits.evolution_threshold, 0.0)?;

        let emotion = &self.emotion;
        within("emotion.arousal_threshold", emotion.arousal_threshold, 0.0, 100.0)?;
        within("emotion.regulation_min_budget", emotion.regulation_min_budget, 0.0, 100.0)?;
        within("emotion.regulation_cost", emotion.regulation_cost, 0.0, 100.0)?;
        at_least("emotion.budget_recovery_per_tick", emotion.budget_recovery_per_tick, 0.0)?;
        positive("emotion.dimension_half_life", emotion.dimension_half_life)?;
        within("emotion.volatility_event_threshold", emotion.volatility_event_threshold, 0.0, 100.0)?;
        within("emotion.panic_override_threshold", emotion.panic_override_threshold, 0.0, 100.0)?;
        within("emotion.override_confidence_penalty", emotion.override_confidence_penalty, 0.0, 100.0)?;

        let memory = &self.memory;
        if memory.capacity == 0 {
            return Err(ConfigError::invalid("memory.capacity", "must be at least 1"));
        }
        if memory.consolidation_min_cluster < 2 {
            return Err(ConfigError::invalid("memory.consolidation_min_cluster", "must be at least 2"));
        }
        within("memory.prune_impact_threshold", memory.prune_impact_threshold, 0.0, 100.0)?;
        within("memory.crystallize_threshold", memory.crystallize_threshold, 0.0, 100.0)?;
        within("memory.crystallized_fraction", memory.crystallized_fraction, 0.0, 1.0)?;
        at_least("memory.tag_weight", memory.tag_weight, 0.0)?;
        at_least("memory.recency_weight", memory.recency_weight, 0.0)?;
        positive("memory.recency_half_life_days", memory.recency_half_life_days)?;
        at_least("memory.staleness_weight", memory.staleness_weight, 0.0)?;
        at_least("memory.impact_weight", memory.impact_weight, 0.0)?;

        let trust = &self.trust;
        for weight in trust.weights.iter() {
            at_least("trust.weights", weight, 0.0)?;
        }
        positive("trust.weights", trust.weights.iter().sum())?;
        for rate in trust.decay_per_day.iter() {
            within("trust.decay_per_day", rate, 0.0, 1.0)?;
        }
        within("trust.decay_per_hop", trust.decay_per_hop, 0.0, 1.0)?;
        within("trust.distrust_gate", trust.distrust_gate, 0.0, 100.0)?;
        within("trust.prune_below", trust.prune_below, 0.0, 100.0)?;
        within("trust.community_threshold", trust.community_threshold, 0.0, 100.0)?;
        within("trust.volatility_alpha", trust.volatility_alpha, 0.0, 1.0)?;

        let strategy = &self.strategy;
        within("strategy.initial_fitness", strategy.initial_fitness, 0.0, 1.0)?;
        within("strategy.ema_alpha", strategy.ema_alpha, 0.0, 1.0)?;
        within("strategy.retirement_floor", strategy.retirement_floor, 0.0, 1.0)?;
        within("strategy.failure_score", strategy.failure_score, 0.0, 1.0)?;
        within("strategy.tag_confidence", strategy.tag_confidence, 0.0, 100.0)?;
        within("strategy.max_confidence_bonus", strategy.max_confidence_bonus, 0.0, 100.0)?;
        if strategy.failure_window == 0 {
            return Err(ConfigError::invalid("strategy.failure_window", "must be at least 1"));
        }

        let agent = &self.agent;
        at_least("agent.energy_recovery_per_tick", agent.energy_recovery_per_tick, 0.0)?;
        at_least("agent.stress_relief_per_tick", agent.stress_relief_per_tick, 0.0)?;
        within("agent.exhausted_below", agent.exhausted_below, 0.0, 100.0)?;
        if agent.pending_session_limit == 0 {
            return Err(ConfigError::invalid("agent.pending_session_limit", "must be at least 1"));
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads configuration from the default path, or uses defaults if not found.
    pub fn load_or_default() -> Self {
        Self::from_file(DEFAULT_TUNING_PATH).unwrap_or_else(|e| {
            tracing::warn!(path = DEFAULT_TUNING_PATH, error = %e, "using default tuning");
            Self::default()
        })
    }
}

/// Virtual clock parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockTuning {
    pub ticks_per_day: u64,
}

impl Default for ClockTuning {
    fn default() -> Self {
        Self {
            ticks_per_day: trader_events::DEFAULT_TICKS_PER_DAY,
        }
    }
}

/// Trait evolution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitTuning {
    /// Maximum drift per trait within one tick, summed over all updates
    pub per_tick_cap: f64,
    /// Maximum lifetime drift per trait from its initial value
    pub lifetime_cap: f64,
    /// |profit_loss| above which an outcome feeds personality evolution
    pub evolution_threshold: f64,
}

impl Default for TraitTuning {
    fn default() -> Self {
        Self {
            per_tick_cap: 2.0,
            lifetime_cap: 20.0,
            evolution_threshold: 50.0,
        }
    }
}

/// Emotion engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionTuning {
    /// Categorical intensity above which the agent counts as aroused
    pub arousal_threshold: f64,
    /// Budget needed before regulation is attempted
    pub regulation_min_budget: f64,
    /// Budget spent by one regulation
    pub regulation_cost: f64,
    pub budget_recovery_per_tick: f64,
    /// Half-life of the pull toward the dimensional baseline
    pub dimension_half_life: f64,
    /// Market volatility above which a volatility event is processed
    pub volatility_event_threshold: f64,
    pub panic_override_threshold: f64,
    pub override_confidence_penalty: f64,
}

impl Default for EmotionTuning {
    fn default() -> Self {
        Self {
            arousal_threshold: 60.0,
            regulation_min_budget: 20.0,
            regulation_cost: 20.0,
            budget_recovery_per_tick: 5.0,
            dimension_half_life: 12.0,
            volatility_event_threshold: 70.0,
            panic_override_threshold: 60.0,
            override_confidence_penalty: 30.0,
        }
    }
}

/// Memory store parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTuning {
    pub capacity: usize,
    pub recall_top_k: usize,
    /// Stale records below this impact are pruned
    pub prune_impact_threshold: f64,
    /// Records at or above this impact are crystallized
    pub crystallize_threshold: f64,
    /// Share of capacity that may be crystallized
    pub crystallized_fraction: f64,
    pub consolidation_min_cluster: usize,
    pub consolidation_window_days: u64,
    /// Score per shared tag (alpha)
    pub tag_weight: f64,
    /// Score for a brand-new record (beta)
    pub recency_weight: f64,
    pub recency_half_life_days: f64,
    /// Penalty per day beyond retention (gamma)
    pub staleness_weight: f64,
    /// Score per point of emotional impact (delta)
    pub impact_weight: f64,
}

impl Default for MemoryTuning {
    fn default() -> Self {
        Self {
            capacity: 500,
            recall_top_k: 16,
            prune_impact_threshold: 30.0,
            crystallize_threshold: 85.0,
            crystallized_fraction: 0.10,
            consolidation_min_cluster: 5,
            consolidation_window_days: 7,
            tag_weight: 10.0,
            recency_weight: 20.0,
            recency_half_life_days: 7.0,
            staleness_weight: 0.5,
            impact_weight: 0.3,
        }
    }
}

impl MemoryTuning {
    /// Maximum number of crystallized records.
    pub fn crystallized_cap(&self) -> usize {
        ((self.capacity as f64) * self.crystallized_fraction).floor() as usize
    }
}

/// Trust network parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustTuning {
    /// Weights of the scalar trust blend
    pub weights: TrustDimensions,
    /// Fraction of each dimension lost per idle day
    pub decay_per_day: TrustDimensions,
    pub max_hops: usize,
    pub decay_per_hop: f64,
    /// Observers trusting the actor less than this ignore further bad news
    pub distrust_gate: f64,
    pub prune_below: f64,
    pub prune_min_interactions: usize,
    pub community_threshold: f64,
    pub log_capacity: usize,
    pub volatility_alpha: f64,
}

impl Default for TrustTuning {
    fn default() -> Self {
        Self {
            weights: TrustDimensions::new(0.25, 0.25, 0.30, 0.20),
            decay_per_day: TrustDimensions::new(0.005, 0.010, 0.003, 0.015),
            max_hops: 3,
            decay_per_hop: 0.5,
            distrust_gate: 30.0,
            prune_below: 10.0,
            prune_min_interactions: 3,
            community_threshold: 60.0,
            log_capacity: 100,
            volatility_alpha: 0.3,
        }
    }
}

/// Strategy store parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyTuning {
    pub initial_fitness: f64,
    pub ema_alpha: f64,
    pub retirement_floor: f64,
    pub retirement_streak: u32,
    pub rate_limit_window: u64,
    pub rate_limit_max: usize,
    /// Number of recent scores used for the failure rate
    pub failure_window: usize,
    /// Scores below this count as failures
    pub failure_score: f64,
    /// Strategy confidence needed to tag a decision
    pub tag_confidence: f64,
    pub max_confidence_bonus: f64,
}

impl Default for StrategyTuning {
    fn default() -> Self {
        Self {
            initial_fitness: 0.6,
            ema_alpha: 0.2,
            retirement_floor: 0.25,
            retirement_streak: 5,
            rate_limit_window: 12,
            rate_limit_max: 6,
            failure_window: 10,
            failure_score: 0.4,
            tag_confidence: 70.0,
            max_confidence_bonus: 10.0,
        }
    }
}

/// Agent-level bookkeeping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    pub energy_recovery_per_tick: f64,
    pub stress_relief_per_tick: f64,
    /// Below this energy the agent abstains
    pub exhausted_below: f64,
    pub pending_session_limit: usize,
    pub outcome_history: usize,
    /// Experiences that still carry the early-life impact bonus
    pub early_life_experiences: u64,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            energy_recovery_per_tick: 4.0,
            stress_relief_per_tick: 0.5,
            exhausted_below: 10.0,
            pending_session_limit: 32,
            outcome_history: 50,
            early_life_experiences: 10,
        }
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{} is outside [{}, {}]", value, min, max)))
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{} is below {}", value, min)))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{} must be positive", value)))
    }
}
