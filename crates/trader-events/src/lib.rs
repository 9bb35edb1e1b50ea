//! Shared stimulus, decision and outcome types for the trader simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod decision;
pub mod ids;
pub mod outcome;
pub mod stimulus;
pub mod timestamp;
pub mod validation;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export timestamp types
pub use timestamp::{SimTime, DEFAULT_TICKS_PER_DAY};

// Re-export identifier types
pub use ids::{AgentId, SessionId};

// Re-export stimulus types
pub use stimulus::{MarketSnapshot, NetworkContext, Opportunity, OpportunityType};

// Re-export decision types
pub use decision::{Action, Decision, RelationshipQuality};

// Re-export outcome types
pub use outcome::{CounterpartyBehavior, Outcome};

pub use validation::ValidationError;
