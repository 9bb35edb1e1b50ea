//! Error types for the cognition core.
//!
//! Input-shape errors fail fast. Missing references are recoverable: callers
//! log them and move on. Plasticity and capacity limits are not errors at all;
//! they are enforced by clipping and eviction.

use thiserror::Error;
use trader_events::{AgentId, SessionId, ValidationError};

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; the caller must fix the request
    InputShape,
    /// Reference to something that does not exist (anymore)
    MissingReference,
    /// Export, import or configuration problems
    Persistence,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error("unknown trait: {0}")]
    UnknownTrait(String),

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfBounds {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("agent {0} interacts with itself")]
    SelfInteraction(AgentId),

    #[error("agent {0} already exists")]
    DuplicateAgent(AgentId),

    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("no open session {session} for agent {agent}")]
    UnknownSession { agent: AgentId, session: SessionId },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("import for {found} cannot be applied to handle {expected}")]
    IdMismatch { expected: AgentId, found: AgentId },

    #[error("unsupported schema version {found} (expected {expected})")]
    SchemaVersion { expected: u32, found: u32 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Invalid(_)
            | CoreError::UnknownTrait(_)
            | CoreError::OutOfBounds { .. }
            | CoreError::SelfInteraction(_)
            | CoreError::DuplicateAgent(_) => ErrorKind::InputShape,
            CoreError::UnknownAgent(_)
            | CoreError::UnknownSession { .. }
            | CoreError::UnknownStrategy(_) => ErrorKind::MissingReference,
            CoreError::IdMismatch { .. }
            | CoreError::SchemaVersion { .. }
            | CoreError::Serialization(_)
            | CoreError::Config(_) => ErrorKind::Persistence,
        }
    }

    /// Recoverable errors are logged and skipped by the population driver.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::MissingReference
    }

    /// Builds an [`CoreError::OutOfBounds`] unless `value` lies in `[min, max]`.
    pub fn check_bounds(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
        if value.is_finite() && value >= min && value <= max {
            Ok(())
        } else {
            Err(CoreError::OutOfBounds {
                field: field.to_string(),
                value,
                min,
                max,
            })
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
