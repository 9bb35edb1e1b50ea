//! Outcome Types
//!
//! The external executor reports back what happened to a decision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{check_finite, check_range, ValidationError};

/// How the counterparty behaved during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterpartyBehavior {
    Successful,
    Failed,
    Betrayal,
    Cooperation,
}

impl CounterpartyBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyBehavior::Successful => "successful",
            CounterpartyBehavior::Failed => "failed",
            CounterpartyBehavior::Betrayal => "betrayal",
            CounterpartyBehavior::Cooperation => "cooperation",
        }
    }
}

impl fmt::Display for CounterpartyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterpartyBehavior {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "successful" => Ok(CounterpartyBehavior::Successful),
            "failed" => Ok(CounterpartyBehavior::Failed),
            "betrayal" => Ok(CounterpartyBehavior::Betrayal),
            "cooperation" => Ok(CounterpartyBehavior::Cooperation),
            _ => Err(ValidationError::UnknownBehavior(s.to_string())),
        }
    }
}

/// Result of executing a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub profit_loss: f64,
    /// Ticks the execution took; never negative
    pub execution_time: f64,
    pub counterparty_behavior: CounterpartyBehavior,
    pub unexpected: bool,
    /// 0 to 100
    pub difficulty: f64,
}

impl Outcome {
    pub fn new(profit_loss: f64, counterparty_behavior: CounterpartyBehavior) -> Self {
        Self {
            profit_loss,
            execution_time: 1.0,
            counterparty_behavior,
            unexpected: false,
            difficulty: 50.0,
        }
    }

    pub fn with_unexpected(mut self, unexpected: bool) -> Self {
        self.unexpected = unexpected;
        self
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_execution_time(mut self, execution_time: f64) -> Self {
        self.execution_time = execution_time;
        self
    }

    pub fn is_profitable(&self) -> bool {
        self.profit_loss > 0.0
    }

    /// Checks the outcome against its schema.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_finite("profit_loss", self.profit_loss)?;
        check_range("execution_time", self.execution_time, 0.0, f64::MAX)?;
        check_range("difficulty", self.difficulty, 0.0, 100.0)?;
        Ok(())
    }
}
