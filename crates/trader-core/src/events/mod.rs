//! Event Logging
//!
//! JSONL record of decisions and outcome reports.

pub mod logger;

pub use logger::{DecisionLog, LogEntry, LogRecord};
