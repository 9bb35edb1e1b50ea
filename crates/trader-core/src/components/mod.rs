//! Agent Components
//!
//! Per-agent cognitive stores plus the shared trust network.

pub mod agent;
pub mod emotion;
pub mod memory;
pub mod relationship;
pub mod strategy;
pub mod traits;
pub mod trust;

pub use agent::*;
pub use emotion::*;
pub use memory::*;
pub use relationship::*;
pub use strategy::*;
pub use traits::*;
pub use trust::*;
