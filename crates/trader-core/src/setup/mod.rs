//! Population Setup
//!
//! Seeded agent spawning for runs and tests.

pub mod agents;

pub use agents::*;
