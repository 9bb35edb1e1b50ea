//! Decision Types
//!
//! A decision is produced atomically by one decide call and carries a
//! reasoning trace assembled from every stage that contributed to it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AgentId, OpportunityType, SessionId, SimTime};

/// What the agent chose to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Enter,
    Exit,
    Hold,
    GatherInfo,
    Negotiate,
    Abstain,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Enter => "ENTER",
            Action::Exit => "EXIT",
            Action::Hold => "HOLD",
            Action::GatherInfo => "GATHER_INFO",
            Action::Negotiate => "NEGOTIATE",
            Action::Abstain => "ABSTAIN",
        }
    }

    /// Opens or grows a position.
    pub fn is_entry(&self) -> bool {
        matches!(self, Action::Enter)
    }

    /// Extra energy cost for actions that involve research or bargaining.
    pub fn is_involved(&self) -> bool {
        matches!(self, Action::GatherInfo | Action::Negotiate)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a relationship with a counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipQuality {
    TrustedPartner,
    ReliableContact,
    Neutral,
    RiskyCounterparty,
    Avoid,
    #[default]
    Unknown,
}

impl RelationshipQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipQuality::TrustedPartner => "trusted_partner",
            RelationshipQuality::ReliableContact => "reliable_contact",
            RelationshipQuality::Neutral => "neutral",
            RelationshipQuality::RiskyCounterparty => "risky_counterparty",
            RelationshipQuality::Avoid => "avoid",
            RelationshipQuality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RelationshipQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision together with the trace of why it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub opportunity_type: OpportunityType,
    pub action: Action,
    /// Asset or counterparty the action is aimed at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<AgentId>,
    pub size: f64,
    /// 0 to 100
    pub confidence: f64,
    pub risk_adjustment: f64,
    pub timing_adjustment: f64,
    pub emotional_override: bool,
    /// Name of the strategy that tagged this decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_quality: Option<RelationshipQuality>,
    pub reasoning: Vec<String>,
    pub decided_at: SimTime,
}

impl Decision {
    /// The reasoning trace as a single line.
    pub fn reasoning_text(&self) -> String {
        self.reasoning.join(" | ")
    }

    /// True if any reasoning entry contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.reasoning.iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Action::GatherInfo).unwrap(), "\"GATHER_INFO\"");
        assert_eq!(Action::Exit.to_string(), "EXIT");
        assert!(Action::Negotiate.is_involved());
        assert!(!Action::Hold.is_involved());
    }

    #[test]
    fn test_quality_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RelationshipQuality::RiskyCounterparty).unwrap(),
            "\"risky_counterparty\""
        );
        assert_eq!(RelationshipQuality::default(), RelationshipQuality::Unknown);
    }

    #[test]
    fn test_reasoning_helpers() {
        let decision = Decision {
            session_id: SessionId::from_random_bytes([1; 16]),
            agent_id: AgentId::from("trader_1"),
            opportunity_type: OpportunityType::DayTrade,
            action: Action::Enter,
            target: None,
            counterparty: None,
            size: 10.0,
            confidence: 65.0,
            risk_adjustment: 0.0,
            timing_adjustment: 0.0,
            emotional_override: false,
            strategy: None,
            relationship_quality: None,
            reasoning: vec!["[base] day_trade".into(), "[emotion] calm".into()],
            decided_at: SimTime::ZERO,
        };
        assert_eq!(decision.reasoning_text(), "[base] day_trade | [emotion] calm");
        assert!(decision.mentions("calm"));
        assert!(!decision.mentions("panic"));
    }
}
