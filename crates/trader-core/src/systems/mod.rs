//! Systems
//!
//! The operations that run over agent components: deciding, learning from
//! outcomes, and periodic maintenance.

pub mod decision;
pub mod experience;
pub mod maintenance;

pub use decision::{decide, BASE_POSITION};
pub use experience::{
    emotional_impact, interaction_kind, record_betrayal, record_outcome, record_partnership,
    UpdateReport,
};
pub use maintenance::{maintain_agent, MaintenanceReport};
