//! Stimulus Types
//!
//! Inputs to a decision: the opportunity being weighed, the market backdrop,
//! and what the caller knows about the surrounding network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{check_finite, check_range, ValidationError};
use crate::AgentId;

/// Kind of trading opportunity presented to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityType {
    DayTrade,
    Arbitrage,
    LongTerm,
    SocialTrade,
}

impl OpportunityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::DayTrade => "day_trade",
            OpportunityType::Arbitrage => "arbitrage",
            OpportunityType::LongTerm => "long_term",
            OpportunityType::SocialTrade => "social_trade",
        }
    }

    /// Returns all opportunity type variants.
    pub fn all() -> &'static [OpportunityType] {
        &[
            OpportunityType::DayTrade,
            OpportunityType::Arbitrage,
            OpportunityType::LongTerm,
            OpportunityType::SocialTrade,
        ]
    }
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpportunityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpportunityType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownOpportunityType(s.to_string()))
    }
}

/// An opportunity offered to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub opportunity_type: OpportunityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_profit: Option<f64>,
    /// 0 (trivial) to 100 (very involved)
    pub complexity: f64,
    /// Free-form label for the surrounding market situation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_context: Option<String>,
}

impl Opportunity {
    pub fn new(opportunity_type: OpportunityType) -> Self {
        Self {
            opportunity_type,
            counterparty: None,
            asset: None,
            expected_profit: None,
            complexity: 50.0,
            market_context: None,
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<AgentId>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    pub fn with_expected_profit(mut self, expected_profit: f64) -> Self {
        self.expected_profit = Some(expected_profit);
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_market_context(mut self, context: impl Into<String>) -> Self {
        self.market_context = Some(context.into());
        self
    }

    /// Checks the opportunity against its schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("complexity", self.complexity, 0.0, 100.0)?;
        if let Some(profit) = self.expected_profit {
            check_finite("expected_profit", profit)?;
        }
        if self.opportunity_type == OpportunityType::SocialTrade && self.counterparty.is_none() {
            return Err(ValidationError::MissingField {
                field: "counterparty",
                context: "social_trade",
            });
        }
        Ok(())
    }
}

/// Market backdrop at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketSnapshot {
    /// 0 to 100
    pub volatility: f64,
    /// -100 (falling) to 100 (rising)
    pub trend: f64,
    /// 0 to 100
    pub liquidity: f64,
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self {
            volatility: 30.0,
            trend: 0.0,
            liquidity: 60.0,
        }
    }
}

impl MarketSnapshot {
    pub fn new(volatility: f64, trend: f64, liquidity: f64) -> Self {
        Self {
            volatility,
            trend,
            liquidity,
        }
    }

    /// Checks the snapshot against its schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("volatility", self.volatility, 0.0, 100.0)?;
        check_range("trend", self.trend, -100.0, 100.0)?;
        check_range("liquidity", self.liquidity, 0.0, 100.0)?;
        Ok(())
    }
}

/// What the caller knows about the network around this decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkContext {
    /// Network-wide trust in the counterparty, if the caller looked it up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_trust: Option<f64>,
    /// Size of the agent's trust community
    #[serde(default)]
    pub community_size: usize,
    /// Free-form signals from peers ("cp_7 flagged spoofing")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peer_signals: Vec<String>,
}

impl NetworkContext {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(trust) = self.counterparty_trust {
            check_range("counterparty_trust", trust, 0.0, 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opportunity_type_parse() {
        assert_eq!("day_trade".parse::<OpportunityType>(), Ok(OpportunityType::DayTrade));
        assert_eq!(
            "futures".parse::<OpportunityType>(),
            Err(ValidationError::UnknownOpportunityType("futures".to_string()))
        );
    }

    #[test]
    fn test_opportunity_json_uses_type_key() {
        let opp = Opportunity::new(OpportunityType::Arbitrage).with_asset("BTC");
        let json = serde_json::to_string(&opp).unwrap();
        assert!(json.contains("\"type\":\"arbitrage\""));
        assert!(!json.contains("counterparty"));

        let err = serde_json::from_str::<Opportunity>(r#"{"type":"swing","complexity":10}"#);
        assert!(err.is_err(), "unknown opportunity type must not load");
    }

    #[test]
    fn test_social_trade_requires_counterparty() {
        let opp = Opportunity::new(OpportunityType::SocialTrade);
        assert!(matches!(
            opp.validate(),
            Err(ValidationError::MissingField { field: "counterparty", .. })
        ));
        assert!(opp.with_counterparty("cp_1").validate().is_ok());
    }

    #[test]
    fn test_market_validation() {
        assert!(MarketSnapshot::new(40.0, 10.0, 60.0).validate().is_ok());
        assert!(MarketSnapshot::new(40.0, -120.0, 60.0).validate().is_err());
        assert!(MarketSnapshot::new(-1.0, 0.0, 60.0).validate().is_err());
    }

    #[test]
    fn test_complexity_out_of_range() {
        let opp = Opportunity::new(OpportunityType::DayTrade).with_complexity(150.0);
        assert!(matches!(
            opp.validate(),
            Err(ValidationError::OutOfRange { field: "complexity", .. })
        ));
    }
}
