//! Trader Cognition Core
//!
//! Trading agents with personality, emotions, memory, relationships and
//! adaptive strategies, connected by a shared trust network.
//!
//! The [`Population`] arena is the entry point: it owns every agent and the
//! network and drives the decide / record_outcome cycle on a virtual clock.

pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod population;
pub mod rng;
pub mod setup;
pub mod systems;

pub use components::*;

pub use config::{AgentConfig, ConfigError, TuningConfig};
pub use error::{CoreError, ErrorKind, Result};
pub use events::{DecisionLog, LogEntry, LogRecord};
pub use output::{AgentSnapshot, SerializedAgent, SCHEMA_VERSION};
pub use population::{DecisionRequest, OutcomeDelivery, Population, PopulationHook, PopulationMaintenance};
pub use systems::{MaintenanceReport, UpdateReport};
