//! Output Generation
//!
//! Agent snapshots, full exports and snapshot files.

pub mod snapshot;

pub use snapshot::*;
